//! Location sample domain model.

use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::geofence::Coordinate;

/// One GPS reading from a student's device. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationSample {
    pub tenant_id: Uuid,
    pub student_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    pub battery_percent: Option<i32>,
    pub device_id: Option<String>,
    pub captured_at: DateTime<Utc>,
}

impl LocationSample {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// Request payload for submitting a location sample.
///
/// Tenant and student identity come from the authenticated request context,
/// never from the body.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitLocationRequest {
    #[validate(range(min = -90.0, max = 90.0, message = "Latitude must be between -90 and 90"))]
    pub lat: f64,

    #[validate(range(min = -180.0, max = 180.0, message = "Longitude must be between -180 and 180"))]
    pub lon: f64,

    #[validate(range(min = 0.0, max = 1000.0, message = "Accuracy must be between 0 and 1000 meters"))]
    pub accuracy: Option<f64>,

    #[validate(range(min = 0, max = 100, message = "Battery must be between 0 and 100"))]
    pub battery: Option<i32>,

    #[validate(length(min = 1, max = 128, message = "Device id must be 1-128 characters"))]
    pub device_id: Option<String>,

    /// Device capture time. Defaults to the time the server received the sample
    /// and may not run ahead of it by more than the configured clock skew.
    pub captured_at: Option<DateTime<Utc>>,
}

impl SubmitLocationRequest {
    /// Builds the immutable sample for the given request context.
    ///
    /// Capture time is truncated to microseconds, the precision it is stored with.
    pub fn into_sample(
        self,
        tenant_id: Uuid,
        student_id: Uuid,
        received_at: DateTime<Utc>,
        max_skew: Duration,
    ) -> Result<LocationSample, ValidationError> {
        let captured_at = self.captured_at.unwrap_or(received_at);
        shared::validation::validate_capture_time(captured_at, received_at, max_skew)?;

        Ok(LocationSample {
            tenant_id,
            student_id,
            latitude: self.lat,
            longitude: self.lon,
            accuracy: self.accuracy,
            battery_percent: self.battery,
            device_id: self.device_id,
            captured_at: captured_at.trunc_subsecs(6),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submit_request_minimal() {
        let json = r#"{"lat": 24.7136, "lon": 46.6753}"#;
        let request: SubmitLocationRequest = serde_json::from_str(json).unwrap();
        assert!(request.validate().is_ok());
        assert!(request.accuracy.is_none());
        assert!(request.device_id.is_none());
    }

    #[test]
    fn test_submit_request_all_fields() {
        let json = r#"{
            "lat": 24.7136,
            "lon": 46.6753,
            "accuracy": 12.5,
            "battery": 80,
            "deviceId": "pixel-7",
            "capturedAt": "2026-09-01T04:15:00Z"
        }"#;
        let request: SubmitLocationRequest = serde_json::from_str(json).unwrap();
        assert!(request.validate().is_ok());
        assert_eq!(request.battery, Some(80));
        assert_eq!(request.device_id.as_deref(), Some("pixel-7"));
    }

    #[test]
    fn test_submit_request_rejects_out_of_range() {
        let request: SubmitLocationRequest =
            serde_json::from_str(r#"{"lat": 91.0, "lon": 0.0}"#).unwrap();
        assert!(request.validate().is_err());

        let request: SubmitLocationRequest =
            serde_json::from_str(r#"{"lat": 0.0, "lon": 0.0, "accuracy": 1500.0}"#).unwrap();
        assert!(request.validate().is_err());

        let request: SubmitLocationRequest =
            serde_json::from_str(r#"{"lat": 0.0, "lon": 0.0, "battery": 120}"#).unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_into_sample_defaults_capture_time() {
        let request: SubmitLocationRequest =
            serde_json::from_str(r#"{"lat": 1.0, "lon": 2.0}"#).unwrap();
        let tenant = Uuid::new_v4();
        let student = Uuid::new_v4();
        let now = Utc::now();

        let sample = request
            .into_sample(tenant, student, now, Duration::minutes(5))
            .unwrap();
        assert_eq!(sample.tenant_id, tenant);
        assert_eq!(sample.student_id, student);
        assert_eq!(sample.captured_at, now.trunc_subsecs(6));
        assert_eq!(sample.coordinate(), Coordinate::new(1.0, 2.0));
    }

    #[test]
    fn test_into_sample_truncates_to_microseconds() {
        let request: SubmitLocationRequest = serde_json::from_str(
            r#"{"lat": 1.0, "lon": 2.0, "capturedAt": "2026-09-01T04:15:00.123456789Z"}"#,
        )
        .unwrap();

        let sample = request
            .into_sample(Uuid::new_v4(), Uuid::new_v4(), Utc::now(), Duration::minutes(5))
            .unwrap();
        assert_eq!(sample.captured_at.timestamp_subsec_nanos(), 123_456_000);
    }

    #[test]
    fn test_into_sample_rejects_future_capture_time() {
        let request: SubmitLocationRequest = serde_json::from_str(
            r#"{"lat": 24.7136, "lon": 46.6753, "capturedAt": "2099-01-01T07:15:00Z"}"#,
        )
        .unwrap();
        assert!(request.validate().is_ok());

        let err = request
            .into_sample(Uuid::new_v4(), Uuid::new_v4(), Utc::now(), Duration::minutes(5))
            .unwrap_err();
        assert_eq!(err.code, "captured_at_future");
    }

    #[test]
    fn test_into_sample_accepts_small_clock_drift() {
        let now = Utc::now();
        let request = SubmitLocationRequest {
            lat: 1.0,
            lon: 2.0,
            accuracy: None,
            battery: None,
            device_id: None,
            captured_at: Some(now + Duration::seconds(90)),
        };

        let sample = request
            .into_sample(Uuid::new_v4(), Uuid::new_v4(), now, Duration::minutes(5))
            .unwrap();
        assert!(sample.captured_at > now);
    }
}
