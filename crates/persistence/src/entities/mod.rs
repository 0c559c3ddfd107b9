//! Database entity definitions.
//!
//! Entities are direct mappings to database rows.

pub mod attendance;
pub mod containment_state;
pub mod geofence;
pub mod geofence_event;

pub use attendance::{AttendanceRecordEntity, AttendanceSettingsEntity, ClassEnrollmentEntity};
pub use containment_state::ContainmentStateEntity;
pub use geofence::{GeofenceEntity, ShapeColumns};
pub use geofence_event::GeofenceEventEntity;
