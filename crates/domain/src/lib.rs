//! Domain layer for the geo-attendance backend.
//!
//! This crate contains:
//! - Domain models (Geofence, LocationSample, ContainmentState, GeofenceEvent, AttendanceRecord)
//! - The geofence evaluation, event classification and attendance marking services
//! - Storage contracts implemented by the persistence layer
//! - Domain error types

pub mod errors;
pub mod models;
pub mod services;
