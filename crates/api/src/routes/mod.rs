//! HTTP route handlers.

pub mod attendance_settings;
pub mod geofence_events;
pub mod geofences;
pub mod health;
pub mod locations;
