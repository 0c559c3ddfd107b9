//! Domain models for geo-attendance.

pub mod attendance;
pub mod containment;
pub mod geofence;
pub mod geofence_event;
pub mod location;

pub use attendance::{
    AttendanceRecord, AttendanceStatus, AttendanceUpsert, AttendanceWindow, ClassEnrollment,
    NoOpReason,
};
pub use containment::ContainmentState;
pub use geofence::{Coordinate, FenceShape, FenceType, Geofence};
pub use geofence_event::{GeofenceEvent, GeofenceTransitionType};
pub use location::LocationSample;
