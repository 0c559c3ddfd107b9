//! Geofence event domain models and DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Geofence containment transition type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GeofenceTransitionType {
    Enter,
    Exit,
    Inside,
}

impl GeofenceTransitionType {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enter => "ENTER",
            Self::Exit => "EXIT",
            Self::Inside => "INSIDE",
        }
    }

    /// Parse from string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "ENTER" => Some(Self::Enter),
            "EXIT" => Some(Self::Exit),
            "INSIDE" => Some(Self::Inside),
            _ => None,
        }
    }
}

impl std::fmt::Display for GeofenceTransitionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immutable record of a containment transition.
///
/// Only `processed_at` is ever written after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeofenceEvent {
    pub event_id: Uuid,
    pub tenant_id: Uuid,
    pub student_id: Uuid,
    pub geofence_id: Uuid,
    pub event_type: GeofenceTransitionType,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    pub occurred_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

/// Query parameters for listing geofence events.
/// GET /api/v1/geofence-events?studentId=<uuid>
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListGeofenceEventsQuery {
    pub student_id: Option<Uuid>,
    pub geofence_id: Option<Uuid>,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

/// Response for a single geofence event.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeofenceEventResponse {
    pub event_id: Uuid,
    pub student_id: Uuid,
    pub geofence_id: Uuid,
    pub event_type: GeofenceTransitionType,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    pub occurred_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
}

impl From<GeofenceEvent> for GeofenceEventResponse {
    fn from(event: GeofenceEvent) -> Self {
        Self {
            event_id: event.event_id,
            student_id: event.student_id,
            geofence_id: event.geofence_id,
            event_type: event.event_type,
            latitude: event.latitude,
            longitude: event.longitude,
            accuracy: event.accuracy,
            occurred_at: event.occurred_at,
            processed_at: event.processed_at,
        }
    }
}

/// Response for listing geofence events.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListGeofenceEventsResponse {
    pub events: Vec<GeofenceEventResponse>,
    pub total: i64,
}
