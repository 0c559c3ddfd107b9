//! Shared utilities for the geo-attendance backend.
//!
//! This crate provides validation logic used across all other crates:
//! - Coordinate range checks and the capture-time skew bound
//! - Geofence radius and polygon ring checks
//! - Time-of-day parsing for attendance windows

pub mod validation;
