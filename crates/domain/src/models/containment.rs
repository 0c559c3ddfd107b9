//! Per student, per geofence containment memory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Whether a student was inside a geofence as of the last evaluated sample.
///
/// At most one row exists per (student, geofence); writes are conditional on
/// `last_evaluated_at` so concurrent samples cannot both apply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainmentState {
    pub tenant_id: Uuid,
    pub student_id: Uuid,
    pub geofence_id: Uuid,
    pub was_inside: bool,
    pub last_evaluated_at: DateTime<Utc>,
    /// Time of the last event emitted for this pair, drives INSIDE throttling.
    pub last_event_at: Option<DateTime<Utc>>,
}

impl ContainmentState {
    /// Whether a sample captured at `captured_at` is older than this state.
    pub fn is_stale(&self, captured_at: DateTime<Utc>) -> bool {
        captured_at <= self.last_evaluated_at
    }
}
