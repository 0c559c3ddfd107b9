//! Background job scheduler and job implementations.

mod cleanup_locations;
mod scheduler;
mod sweep_rate_limits;

pub use cleanup_locations::CleanupLocationsJob;
pub use scheduler::{Job, JobFrequency, JobScheduler};
pub use sweep_rate_limits::SweepRateLimitsJob;
