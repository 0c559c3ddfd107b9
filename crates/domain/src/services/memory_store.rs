//! In-process implementation of every storage collaborator.
//!
//! Used by the pipeline tests and for running the service without a
//! database. Honors the same conditional-update and upsert semantics as the
//! PostgreSQL repositories.

use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::errors::StoreError;
use crate::models::attendance::merge_attendance;
use crate::models::{
    AttendanceRecord, AttendanceUpsert, AttendanceWindow, ClassEnrollment, ContainmentState,
    FenceType, Geofence, GeofenceEvent, GeofenceTransitionType, LocationSample,
};
use crate::services::classifier::Transition;
use crate::services::store::{AttendanceStore, ContainmentStore, FenceRepository, LocationLog};

type StateKey = (Uuid, Uuid, Uuid);
type AttendanceKey = (Uuid, Uuid, Uuid, NaiveDate);

#[derive(Debug, Default)]
struct Inner {
    fences: Vec<Geofence>,
    samples: Vec<LocationSample>,
    states: HashMap<StateKey, ContainmentState>,
    events: Vec<GeofenceEvent>,
    windows: HashMap<Uuid, AttendanceWindow>,
    enrollments: HashMap<(Uuid, Uuid), Vec<ClassEnrollment>>,
    attendance: HashMap<AttendanceKey, AttendanceRecord>,
    /// Pending forced failures of `apply_transition`.
    injected_conflicts: u32,
    unavailable: bool,
}

/// Mutex-guarded store holding all pipeline state in memory.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
    fence_reads: AtomicUsize,
    attendance_writes: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        let inner = self
            .inner
            .lock()
            .map_err(|_| StoreError::Unavailable("in-memory store lock poisoned".to_string()))?;
        if inner.unavailable {
            return Err(StoreError::Unavailable("in-memory store offline".to_string()));
        }
        Ok(inner)
    }

    fn guard(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Adds or replaces a fence by id.
    pub fn put_fence(&self, fence: Geofence) {
        let mut inner = self.guard();
        inner.fences.retain(|f| f.id != fence.id);
        inner.fences.push(fence);
    }

    pub fn set_window(&self, tenant_id: Uuid, window: AttendanceWindow) {
        self.guard().windows.insert(tenant_id, window);
    }

    pub fn enroll(&self, tenant_id: Uuid, student_id: Uuid, class_id: Uuid) {
        self.guard()
            .enrollments
            .entry((tenant_id, student_id))
            .or_default()
            .push(ClassEnrollment {
                tenant_id,
                class_id,
            });
    }

    /// Makes the next `count` conditional updates fail as if raced.
    pub fn inject_conflicts(&self, count: u32) {
        self.guard().injected_conflicts = count;
    }

    /// Simulates the backing store going away.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.guard().unavailable = unavailable;
    }

    pub fn samples(&self) -> Vec<LocationSample> {
        self.guard().samples.clone()
    }

    pub fn events(&self) -> Vec<GeofenceEvent> {
        self.guard().events.clone()
    }

    pub fn state(&self, tenant_id: Uuid, student_id: Uuid, geofence_id: Uuid) -> Option<ContainmentState> {
        self.guard()
            .states
            .get(&(tenant_id, student_id, geofence_id))
            .cloned()
    }

    pub fn attendance_records(&self) -> Vec<AttendanceRecord> {
        self.guard().attendance.values().cloned().collect()
    }

    /// Number of fence reads served, for cache tests.
    pub fn fence_reads(&self) -> usize {
        self.fence_reads.load(Ordering::Relaxed)
    }

    /// Number of upserts that created or changed a row.
    pub fn attendance_writes(&self) -> usize {
        self.attendance_writes.load(Ordering::Relaxed)
    }
}

#[async_trait::async_trait]
impl FenceRepository for InMemoryStore {
    async fn active_fences_for(&self, tenant_id: Uuid) -> Result<Vec<Geofence>, StoreError> {
        let inner = self.lock()?;
        self.fence_reads.fetch_add(1, Ordering::Relaxed);
        Ok(inner
            .fences
            .iter()
            .filter(|f| f.tenant_id == tenant_id && f.active)
            .cloned()
            .collect())
    }
}

#[async_trait::async_trait]
impl LocationLog for InMemoryStore {
    async fn append(&self, sample: &LocationSample) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let stored = inner.samples.iter().any(|s| {
            s.tenant_id == sample.tenant_id
                && s.student_id == sample.student_id
                && s.captured_at == sample.captured_at
        });
        if !stored {
            inner.samples.push(sample.clone());
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ContainmentStore for InMemoryStore {
    async fn states_for(
        &self,
        tenant_id: Uuid,
        student_id: Uuid,
    ) -> Result<HashMap<Uuid, ContainmentState>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .states
            .values()
            .filter(|s| s.tenant_id == tenant_id && s.student_id == student_id)
            .map(|s| (s.geofence_id, s.clone()))
            .collect())
    }

    async fn apply_transition(&self, transition: &Transition) -> Result<bool, StoreError> {
        let mut inner = self.lock()?;
        if inner.injected_conflicts > 0 {
            inner.injected_conflicts -= 1;
            return Ok(false);
        }

        let state = &transition.state;
        let key = (state.tenant_id, state.student_id, state.geofence_id);
        let current = inner.states.get(&key).map(|s| s.last_evaluated_at);
        if current != transition.expected_last_evaluated_at {
            return Ok(false);
        }

        inner.states.insert(key, state.clone());
        if let Some(event) = &transition.event {
            inner.events.push(event.clone());
        }
        Ok(true)
    }

    async fn unmarked_entries(
        &self,
        tenant_id: Uuid,
        student_id: Uuid,
        limit: usize,
    ) -> Result<Vec<GeofenceEvent>, StoreError> {
        let inner = self.lock()?;
        let school_grounds = |geofence_id: Uuid| {
            inner.fences.iter().any(|f| {
                f.id == geofence_id
                    && f.tenant_id == tenant_id
                    && f.active
                    && f.fence_type == FenceType::SchoolGrounds
            })
        };

        let mut entries: Vec<GeofenceEvent> = inner
            .events
            .iter()
            .filter(|e| {
                e.tenant_id == tenant_id
                    && e.student_id == student_id
                    && e.event_type == GeofenceTransitionType::Enter
                    && e.processed_at.is_none()
                    && school_grounds(e.geofence_id)
            })
            .cloned()
            .collect();
        entries.sort_by_key(|e| (e.occurred_at, e.event_id));
        entries.truncate(limit);
        Ok(entries)
    }
}

#[async_trait::async_trait]
impl AttendanceStore for InMemoryStore {
    async fn window_for(&self, tenant_id: Uuid) -> Result<Option<AttendanceWindow>, StoreError> {
        Ok(self.lock()?.windows.get(&tenant_id).copied())
    }

    async fn enrollments_for(
        &self,
        tenant_id: Uuid,
        student_id: Uuid,
    ) -> Result<Vec<ClassEnrollment>, StoreError> {
        Ok(self
            .lock()?
            .enrollments
            .get(&(tenant_id, student_id))
            .cloned()
            .unwrap_or_default())
    }

    async fn upsert_attendance(&self, upsert: &AttendanceUpsert) -> Result<AttendanceRecord, StoreError> {
        let mut inner = self.lock()?;
        let key = (upsert.tenant_id, upsert.student_id, upsert.class_id, upsert.date);
        let existing = inner.attendance.get(&key);
        let merged = merge_attendance(existing, upsert, Utc::now());

        if existing != Some(&merged) {
            self.attendance_writes.fetch_add(1, Ordering::Relaxed);
            inner.attendance.insert(key, merged.clone());
        }
        Ok(merged)
    }

    async fn mark_event_processed(
        &self,
        event_id: Uuid,
        processed_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if let Some(event) = inner.events.iter_mut().find(|e| e.event_id == event_id) {
            event.processed_at.get_or_insert(processed_at);
        }
        Ok(())
    }
}
