//! Common validation utilities.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use validator::ValidationError;

/// Smallest radius accepted for a circular geofence.
pub const MIN_RADIUS_METERS: f64 = 10.0;

/// Largest radius accepted for a circular geofence.
pub const MAX_RADIUS_METERS: f64 = 5000.0;

/// A closed ring needs three distinct vertices plus the closing point.
pub const MIN_RING_POINTS: usize = 4;

fn error(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

/// Validates that a latitude value is within valid range (-90 to 90).
pub fn validate_latitude(lat: f64) -> Result<(), ValidationError> {
    if (-90.0..=90.0).contains(&lat) {
        Ok(())
    } else {
        Err(error("latitude_range", "Latitude must be between -90 and 90"))
    }
}

/// Validates that a longitude value is within valid range (-180 to 180).
pub fn validate_longitude(lon: f64) -> Result<(), ValidationError> {
    if (-180.0..=180.0).contains(&lon) {
        Ok(())
    } else {
        Err(error("longitude_range", "Longitude must be between -180 and 180"))
    }
}

/// Validates a circular geofence radius.
pub fn validate_radius_meters(radius: f64) -> Result<(), ValidationError> {
    if (MIN_RADIUS_METERS..=MAX_RADIUS_METERS).contains(&radius) {
        Ok(())
    } else {
        Err(error(
            "radius_range",
            "Radius must be between 10 and 5000 meters",
        ))
    }
}

/// Validates a polygon ring given as `(latitude, longitude)` pairs.
///
/// The ring must hold at least four points, every point must be a valid
/// coordinate, and the last point must repeat the first.
pub fn validate_ring(points: &[(f64, f64)]) -> Result<(), ValidationError> {
    if points.len() < MIN_RING_POINTS {
        return Err(error(
            "ring_too_short",
            "Polygon must contain at least 4 points",
        ));
    }

    for &(lat, lon) in points {
        validate_latitude(lat)?;
        validate_longitude(lon)?;
    }

    if points.first() != points.last() {
        return Err(error(
            "ring_not_closed",
            "Polygon first and last points must be equal",
        ));
    }

    Ok(())
}

/// Rejects a device capture time more than `max_skew` ahead of `received_at`.
pub fn validate_capture_time(
    captured_at: DateTime<Utc>,
    received_at: DateTime<Utc>,
    max_skew: Duration,
) -> Result<(), ValidationError> {
    if captured_at <= received_at + max_skew {
        Ok(())
    } else {
        Err(error(
            "captured_at_future",
            "Capture time is ahead of the server clock",
        ))
    }
}

/// Parses a `HH:MM` time of day.
pub fn parse_time_of_day(value: &str) -> Result<NaiveTime, ValidationError> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .map_err(|_| error("time_of_day", "Time must use the HH:MM 24-hour format"))
}

/// Validator-compatible wrapper around [`parse_time_of_day`].
pub fn validate_time_of_day(value: &str) -> Result<(), ValidationError> {
    parse_time_of_day(value).map(|_| ())
}
