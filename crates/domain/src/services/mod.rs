//! Attendance pipeline services.

pub mod classifier;
pub mod engine;
pub mod evaluator;
pub mod fence_cache;
pub mod geometry;
pub mod marker;
pub mod memory_store;
pub mod store;

pub use classifier::{classify, Classification, InsideEventPolicy, Transition};
pub use engine::{AutoAttendanceEngine, MarkSkip, PipelineReport};
pub use evaluator::{evaluate, primary_fence, prioritize, EvaluationResult};
pub use fence_cache::CachedFenceRepository;
pub use marker::{mark, MarkOutcome};
pub use memory_store::InMemoryStore;
pub use store::{AttendanceStore, ContainmentStore, FenceRepository, LocationLog};
