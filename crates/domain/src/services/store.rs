//! Storage collaborators of the attendance pipeline.
//!
//! Every read is scoped by tenant. Implementations live in the persistence
//! crate (PostgreSQL) and in [`memory_store`](super::memory_store).

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

use crate::errors::StoreError;
use crate::models::{
    AttendanceRecord, AttendanceUpsert, AttendanceWindow, ClassEnrollment, ContainmentState,
    Geofence, GeofenceEvent, LocationSample,
};
use crate::services::classifier::Transition;

/// Read access to a tenant's geofences.
#[async_trait::async_trait]
pub trait FenceRepository: Send + Sync {
    /// Active fences owned by `tenant_id`.
    async fn active_fences_for(&self, tenant_id: Uuid) -> Result<Vec<Geofence>, StoreError>;
}

/// Append-only log of received samples.
#[async_trait::async_trait]
pub trait LocationLog: Send + Sync {
    /// Stores a sample once per (tenant, student, capture time); repeats are ignored.
    async fn append(&self, sample: &LocationSample) -> Result<(), StoreError>;
}

/// Containment memory and the event log written alongside it.
#[async_trait::async_trait]
pub trait ContainmentStore: Send + Sync {
    /// All containment rows of one student, keyed by geofence id.
    async fn states_for(
        &self,
        tenant_id: Uuid,
        student_id: Uuid,
    ) -> Result<HashMap<Uuid, ContainmentState>, StoreError>;

    /// Conditionally writes the new state and appends its event atomically.
    ///
    /// Returns `false` without writing anything when the stored state no
    /// longer matches `transition.expected_last_evaluated_at`.
    async fn apply_transition(&self, transition: &Transition) -> Result<bool, StoreError>;

    /// ENTER events on the student's active school-grounds fences that the
    /// marker has not handled yet (`processed_at` unset), oldest first.
    async fn unmarked_entries(
        &self,
        tenant_id: Uuid,
        student_id: Uuid,
        limit: usize,
    ) -> Result<Vec<GeofenceEvent>, StoreError>;
}

/// Attendance configuration, enrollments and the attendance upsert.
#[async_trait::async_trait]
pub trait AttendanceStore: Send + Sync {
    /// Tenant-specific window, `None` when the tenant uses the default.
    async fn window_for(&self, tenant_id: Uuid) -> Result<Option<AttendanceWindow>, StoreError>;

    async fn enrollments_for(
        &self,
        tenant_id: Uuid,
        student_id: Uuid,
    ) -> Result<Vec<ClassEnrollment>, StoreError>;

    /// Single atomic insert-or-merge keyed by (tenant, student, class, date).
    /// Merge semantics follow [`merge_attendance`](crate::models::attendance::merge_attendance).
    async fn upsert_attendance(&self, upsert: &AttendanceUpsert) -> Result<AttendanceRecord, StoreError>;

    /// Stamps `processed_at` on an ENTER event once the marker has handled it.
    /// The first stamp wins.
    async fn mark_event_processed(
        &self,
        event_id: Uuid,
        processed_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}
