//! Repository implementations for database operations.

pub mod attendance;
pub mod containment;
pub mod geofence;
pub mod geofence_event;
pub mod location;

pub use attendance::AttendanceRepository;
pub use containment::ContainmentRepository;
pub use geofence::{GeofenceChanges, GeofenceRepository};
pub use geofence_event::GeofenceEventRepository;
pub use location::LocationRepository;
