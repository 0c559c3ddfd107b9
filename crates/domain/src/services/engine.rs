//! Auto-attendance pipeline.
//!
//! One call to [`AutoAttendanceEngine::process_sample`] runs
//! evaluate, classify and mark for a single location sample. The engine keeps
//! no state between calls; containment memory and attendance live in the
//! storage collaborators.

use chrono::Utc;
use metrics::counter;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

use crate::errors::{EngineError, StoreError};
use crate::models::{
    AttendanceRecord, AttendanceWindow, ClassEnrollment, Geofence, GeofenceEvent,
    GeofenceTransitionType, LocationSample, NoOpReason,
};
use crate::services::classifier::{classify, InsideEventPolicy};
use crate::services::evaluator::{evaluate, primary_fence, EvaluationResult};
use crate::services::marker::{mark, MarkOutcome};
use crate::services::store::{AttendanceStore, ContainmentStore, FenceRepository, LocationLog};

/// Attempts at the conditional containment update before giving up.
const MAX_APPLY_ATTEMPTS: usize = 2;

/// Earlier unmarked ENTER events picked up by one run.
const MAX_UNMARKED_ENTRIES: usize = 50;

/// An event the marker declined to act on.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkSkip {
    pub event_id: Uuid,
    pub geofence_id: Uuid,
    pub reason: NoOpReason,
}

/// What the marker did with one event.
enum Handled {
    Written(Vec<AttendanceRecord>),
    Skipped(NoOpReason),
}

/// Everything one pipeline run produced.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineReport {
    pub evaluations: Vec<EvaluationResult>,
    /// Most specific fence containing the sample.
    pub primary_geofence_id: Option<Uuid>,
    pub events: Vec<GeofenceEvent>,
    pub attendance: Vec<AttendanceRecord>,
    pub no_ops: Vec<MarkSkip>,
    /// Fences ignored because the sample was older than their stored state.
    pub skipped: Vec<Uuid>,
    /// Earlier ENTER events whose attendance this run marked.
    pub recovered: Vec<Uuid>,
}

/// Runs the evaluate/classify/mark pipeline against pluggable stores.
#[derive(Clone)]
pub struct AutoAttendanceEngine {
    fences: Arc<dyn FenceRepository>,
    locations: Arc<dyn LocationLog>,
    containment: Arc<dyn ContainmentStore>,
    attendance: Arc<dyn AttendanceStore>,
    inside_policy: InsideEventPolicy,
    default_window: AttendanceWindow,
}

impl AutoAttendanceEngine {
    pub fn new(
        fences: Arc<dyn FenceRepository>,
        locations: Arc<dyn LocationLog>,
        containment: Arc<dyn ContainmentStore>,
        attendance: Arc<dyn AttendanceStore>,
    ) -> Self {
        Self {
            fences,
            locations,
            containment,
            attendance,
            inside_policy: InsideEventPolicy::default(),
            default_window: AttendanceWindow::default(),
        }
    }

    /// Builds an engine whose collaborators are all backed by one store.
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: FenceRepository + LocationLog + ContainmentStore + AttendanceStore + 'static,
    {
        Self::new(store.clone(), store.clone(), store.clone(), store)
    }

    pub fn with_inside_policy(mut self, policy: InsideEventPolicy) -> Self {
        self.inside_policy = policy;
        self
    }

    pub fn with_default_window(mut self, window: AttendanceWindow) -> Self {
        self.default_window = window;
        self
    }

    pub fn default_window(&self) -> AttendanceWindow {
        self.default_window
    }

    /// The window in force for a tenant and whether it is the default.
    pub async fn effective_window(&self, tenant_id: Uuid) -> Result<(AttendanceWindow, bool), StoreError> {
        Ok(match self.attendance.window_for(tenant_id).await? {
            Some(window) => (window, false),
            None => (self.default_window, true),
        })
    }

    /// Processes one validated sample end to end.
    pub async fn process_sample(&self, sample: &LocationSample) -> Result<PipelineReport, EngineError> {
        self.locations.append(sample).await?;

        let fences = self.fences.active_fences_for(sample.tenant_id).await?;
        let evaluations = evaluate(sample, &fences)?;

        let mut report = PipelineReport {
            primary_geofence_id: primary_fence(&evaluations, &fences).map(|f| f.id),
            ..PipelineReport::default()
        };

        let mut pending = evaluations.clone();
        for attempt in 1..=MAX_APPLY_ATTEMPTS {
            let prior = self
                .containment
                .states_for(sample.tenant_id, sample.student_id)
                .await?;
            let classification = classify(sample, &pending, &prior, self.inside_policy);
            report.skipped.extend(classification.stale.iter().copied());

            let mut conflicted = HashSet::new();
            for transition in classification.transitions {
                if self.containment.apply_transition(&transition).await? {
                    report.events.extend(transition.event);
                } else {
                    conflicted.insert(transition.state.geofence_id);
                }
            }

            if conflicted.is_empty() {
                break;
            }
            if attempt == MAX_APPLY_ATTEMPTS {
                tracing::warn!(
                    tenant_id = %sample.tenant_id,
                    student_id = %sample.student_id,
                    conflicts = conflicted.len(),
                    "Containment update conflicted after retry"
                );
                return Err(EngineError::Conflict {
                    student_id: sample.student_id,
                });
            }

            tracing::warn!(
                tenant_id = %sample.tenant_id,
                student_id = %sample.student_id,
                conflicts = conflicted.len(),
                "Containment update conflicted, retrying with fresh state"
            );
            pending.retain(|r| conflicted.contains(&r.geofence_id));
        }
        report.evaluations = evaluations;

        for event in &report.events {
            counter!("geofence_events_total", "event_type" => event.event_type.as_str()).increment(1);
        }

        self.mark_events(sample, &fences, &mut report).await?;

        tracing::debug!(
            tenant_id = %sample.tenant_id,
            student_id = %sample.student_id,
            fences = report.evaluations.len(),
            events = report.events.len(),
            attendance = report.attendance.len(),
            "Location sample processed"
        );

        Ok(report)
    }

    /// Marks this run's events plus any earlier ENTER a failed run left
    /// unmarked. Every ENTER the marker handles is stamped processed.
    async fn mark_events(
        &self,
        sample: &LocationSample,
        fences: &[Geofence],
        report: &mut PipelineReport,
    ) -> Result<(), EngineError> {
        let fresh: HashSet<Uuid> = report.events.iter().map(|e| e.event_id).collect();
        let backlog: Vec<GeofenceEvent> = self
            .containment
            .unmarked_entries(sample.tenant_id, sample.student_id, MAX_UNMARKED_ENTRIES)
            .await?
            .into_iter()
            .filter(|e| !fresh.contains(&e.event_id))
            .collect();

        if report.events.is_empty() && backlog.is_empty() {
            return Ok(());
        }

        let by_id: HashMap<Uuid, &Geofence> = fences.iter().map(|f| (f.id, f)).collect();

        let has_enter = !backlog.is_empty()
            || report
                .events
                .iter()
                .any(|e| e.event_type == GeofenceTransitionType::Enter);
        let (window, enrollments): (AttendanceWindow, Vec<ClassEnrollment>) = if has_enter {
            let (window, _) = self.effective_window(sample.tenant_id).await?;
            let enrollments = self
                .attendance
                .enrollments_for(sample.tenant_id, sample.student_id)
                .await?;
            (window, enrollments)
        } else {
            (self.default_window, Vec::new())
        };

        for mut event in backlog {
            let Some(fence) = by_id.get(&event.geofence_id) else {
                continue;
            };

            tracing::info!(
                tenant_id = %event.tenant_id,
                student_id = %event.student_id,
                event_id = %event.event_id,
                occurred_at = %event.occurred_at,
                "Marking attendance for an earlier entry"
            );
            counter!("attendance_recovered_total").increment(1);

            let handled = self.mark_event(&mut event, fence, &window, &enrollments).await?;
            report.recovered.push(event.event_id);
            match handled {
                Handled::Written(records) => report.attendance.extend(records),
                Handled::Skipped(reason) => report.no_ops.push(MarkSkip {
                    event_id: event.event_id,
                    geofence_id: event.geofence_id,
                    reason,
                }),
            }
        }

        for event in report.events.iter_mut() {
            let Some(fence) = by_id.get(&event.geofence_id) else {
                continue;
            };

            match self.mark_event(event, fence, &window, &enrollments).await? {
                Handled::Written(records) => report.attendance.extend(records),
                Handled::Skipped(reason) => report.no_ops.push(MarkSkip {
                    event_id: event.event_id,
                    geofence_id: event.geofence_id,
                    reason,
                }),
            }
        }

        Ok(())
    }

    async fn mark_event(
        &self,
        event: &mut GeofenceEvent,
        fence: &Geofence,
        window: &AttendanceWindow,
        enrollments: &[ClassEnrollment],
    ) -> Result<Handled, EngineError> {
        let handled = match mark(event, fence, window, enrollments)? {
            MarkOutcome::NoOp(reason) => {
                counter!("attendance_noop_total", "reason" => reason.as_str()).increment(1);
                Handled::Skipped(reason)
            }
            MarkOutcome::Marked(upserts) => {
                let mut records = Vec::with_capacity(upserts.len());
                for upsert in &upserts {
                    let record = self.attendance.upsert_attendance(upsert).await?;
                    counter!("attendance_marks_total", "status" => upsert.status.as_str()).increment(1);
                    tracing::info!(
                        tenant_id = %record.tenant_id,
                        student_id = %record.student_id,
                        class_id = %record.class_id,
                        date = %record.date,
                        status = %record.status,
                        "Attendance auto-marked"
                    );
                    records.push(record);
                }
                Handled::Written(records)
            }
        };

        if event.event_type == GeofenceTransitionType::Enter {
            let processed_at = Utc::now();
            self.attendance
                .mark_event_processed(event.event_id, processed_at)
                .await?;
            event.processed_at = Some(processed_at);
        }

        Ok(handled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttendanceStatus, FenceShape, FenceType};
    use crate::services::memory_store::InMemoryStore;
    use crate::models::{AttendanceUpsert, ContainmentState};
    use crate::services::classifier::Transition;
    use chrono::{DateTime, TimeZone};
    use fake::faker::lorem::en::Word;
    use fake::Fake;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    const CAMPUS_LAT: f64 = 24.7136;
    const CAMPUS_LON: f64 = 46.6753;

    struct School {
        store: Arc<InMemoryStore>,
        tenant_id: Uuid,
        student_id: Uuid,
        campus: Geofence,
    }

    impl School {
        fn new() -> Self {
            let store = Arc::new(InMemoryStore::new());
            let tenant_id = Uuid::new_v4();
            let student_id = Uuid::new_v4();
            let campus = geofence(
                tenant_id,
                FenceType::SchoolGrounds,
                FenceShape::circle(CAMPUS_LAT, CAMPUS_LON, 500.0).unwrap(),
            );
            store.put_fence(campus.clone());
            store.enroll(tenant_id, student_id, Uuid::new_v4());
            store.enroll(tenant_id, student_id, Uuid::new_v4());

            Self {
                store,
                tenant_id,
                student_id,
                campus,
            }
        }

        fn engine(&self, policy: InsideEventPolicy) -> AutoAttendanceEngine {
            AutoAttendanceEngine::from_store(self.store.clone()).with_inside_policy(policy)
        }

        fn sample(&self, latitude: f64, longitude: f64, at: DateTime<Utc>) -> LocationSample {
            LocationSample {
                tenant_id: self.tenant_id,
                student_id: self.student_id,
                latitude,
                longitude,
                accuracy: Some(10.0),
                battery_percent: Some((5..100).fake()),
                device_id: Some(Word().fake()),
                captured_at: at,
            }
        }

        fn on_campus(&self, hour: u32, minute: u32) -> LocationSample {
            self.sample(CAMPUS_LAT, CAMPUS_LON, at(hour, minute))
        }

        fn off_campus(&self, hour: u32, minute: u32) -> LocationSample {
            self.sample(24.7500, CAMPUS_LON, at(hour, minute))
        }
    }

    fn geofence(tenant_id: Uuid, fence_type: FenceType, shape: FenceShape) -> Geofence {
        Geofence {
            id: Uuid::new_v4(),
            tenant_id,
            name: fence_type.to_string(),
            fence_type,
            active: true,
            shape,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 9, 1, hour, minute, 0).unwrap()
    }

    fn event_types(report: &PipelineReport) -> Vec<GeofenceTransitionType> {
        report.events.iter().map(|e| e.event_type).collect()
    }

    #[tokio::test]
    async fn test_first_entry_marks_present_for_each_class() {
        let school = School::new();
        let engine = school.engine(InsideEventPolicy::default());

        let report = engine.process_sample(&school.on_campus(7, 15)).await.unwrap();

        assert_eq!(event_types(&report), vec![GeofenceTransitionType::Enter]);
        assert_eq!(report.attendance.len(), 2);
        assert!(report
            .attendance
            .iter()
            .all(|r| r.status == AttendanceStatus::Present));
        assert_eq!(report.primary_geofence_id, Some(school.campus.id));
        assert_eq!(school.store.attendance_records().len(), 2);
        assert_eq!(school.store.samples().len(), 1);
    }

    #[tokio::test]
    async fn test_staying_inside_writes_no_more_attendance() {
        let school = School::new();
        let engine = school.engine(InsideEventPolicy::default());

        engine.process_sample(&school.on_campus(7, 15)).await.unwrap();
        let report = engine.process_sample(&school.on_campus(7, 20)).await.unwrap();

        // Throttled policy suppresses INSIDE five minutes after ENTER
        assert!(report.events.is_empty());
        assert!(report.attendance.is_empty());
        assert_eq!(school.store.attendance_writes(), 2);
        assert_eq!(school.store.events().len(), 1);
    }

    #[tokio::test]
    async fn test_every_sample_policy_emits_inside_without_marking() {
        let school = School::new();
        let engine = school.engine(InsideEventPolicy::EverySample);

        engine.process_sample(&school.on_campus(7, 15)).await.unwrap();
        let report = engine.process_sample(&school.on_campus(7, 20)).await.unwrap();

        assert_eq!(event_types(&report), vec![GeofenceTransitionType::Inside]);
        assert_eq!(report.no_ops[0].reason, NoOpReason::WrongEventType);
        assert_eq!(school.store.attendance_writes(), 2);
    }

    #[tokio::test]
    async fn test_late_entry_marks_late() {
        let school = School::new();
        let engine = school.engine(InsideEventPolicy::default());

        let report = engine.process_sample(&school.on_campus(8, 30)).await.unwrap();
        assert_eq!(report.attendance.len(), 2);
        assert!(report.attendance.iter().all(|r| r.status == AttendanceStatus::Late));
    }

    #[tokio::test]
    async fn test_entry_before_window_is_noop() {
        let school = School::new();
        let engine = school.engine(InsideEventPolicy::default());

        let report = engine.process_sample(&school.on_campus(6, 45)).await.unwrap();

        assert_eq!(event_types(&report), vec![GeofenceTransitionType::Enter]);
        assert!(report.attendance.is_empty());
        assert_eq!(report.no_ops.len(), 1);
        assert_eq!(report.no_ops[0].reason, NoOpReason::OutsideWindow);
        assert!(school.store.attendance_records().is_empty());
        // Handled, so later samples do not pick it up again
        assert!(school.store.events()[0].processed_at.is_some());

        let later = engine.process_sample(&school.on_campus(7, 30)).await.unwrap();
        assert!(later.recovered.is_empty());
        assert!(later.attendance.is_empty());
    }

    #[tokio::test]
    async fn test_tenant_window_overrides_default() {
        let school = School::new();
        school.store.set_window(
            school.tenant_id,
            AttendanceWindow {
                utc_offset_minutes: 180,
                ..AttendanceWindow::default()
            },
        );
        let engine = school.engine(InsideEventPolicy::default());

        // 04:15 UTC is 07:15 local
        let report = engine.process_sample(&school.on_campus(4, 15)).await.unwrap();
        assert!(report
            .attendance
            .iter()
            .all(|r| r.status == AttendanceStatus::Present));

        let (_, is_default) = engine.effective_window(school.tenant_id).await.unwrap();
        assert!(!is_default);
    }

    #[tokio::test]
    async fn test_processed_stamp_after_marking() {
        let school = School::new();
        let engine = school.engine(InsideEventPolicy::default());

        let report = engine.process_sample(&school.on_campus(7, 15)).await.unwrap();

        assert!(report.events[0].processed_at.is_some());
        assert!(school.store.events()[0].processed_at.is_some());
    }

    #[tokio::test]
    async fn test_replayed_sample_is_idempotent() {
        let school = School::new();
        let engine = school.engine(InsideEventPolicy::EverySample);
        let sample = school.on_campus(7, 15);

        engine.process_sample(&sample).await.unwrap();
        let replay = engine.process_sample(&sample).await.unwrap();

        assert!(replay.events.is_empty());
        assert!(replay.recovered.is_empty());
        assert_eq!(replay.skipped, vec![school.campus.id]);
        assert_eq!(school.store.samples().len(), 1);
        assert_eq!(school.store.events().len(), 1);
        assert_eq!(school.store.attendance_writes(), 2);
    }

    #[tokio::test]
    async fn test_reentry_same_day_keeps_present() {
        let school = School::new();
        let engine = school.engine(InsideEventPolicy::Never);

        engine.process_sample(&school.on_campus(7, 15)).await.unwrap();
        let exit = engine.process_sample(&school.off_campus(7, 40)).await.unwrap();
        assert_eq!(event_types(&exit), vec![GeofenceTransitionType::Exit]);

        let reentry = engine.process_sample(&school.on_campus(8, 20)).await.unwrap();
        assert_eq!(event_types(&reentry), vec![GeofenceTransitionType::Enter]);

        let records = school.store.attendance_records();
        assert_eq!(records.len(), 2);
        for record in records {
            assert_eq!(record.status, AttendanceStatus::Present);
            let notes = record.notes.unwrap_or_default();
            assert!(notes.contains("07:15"));
            assert!(notes.contains("08:20"));
        }
    }

    #[tokio::test]
    async fn test_nested_classroom_is_primary_but_not_marked() {
        let school = School::new();
        let classroom = geofence(
            school.tenant_id,
            FenceType::Classroom,
            FenceShape::circle(CAMPUS_LAT, CAMPUS_LON, 15.0).unwrap(),
        );
        school.store.put_fence(classroom.clone());
        let engine = school.engine(InsideEventPolicy::default());

        let report = engine.process_sample(&school.on_campus(7, 15)).await.unwrap();

        assert_eq!(report.primary_geofence_id, Some(classroom.id));
        assert_eq!(report.events.len(), 2);
        assert_eq!(report.attendance.len(), 2);
        assert_eq!(report.no_ops.len(), 1);
        assert_eq!(report.no_ops[0].geofence_id, classroom.id);
        assert_eq!(report.no_ops[0].reason, NoOpReason::WrongFenceType);
    }

    #[tokio::test]
    async fn test_student_without_classes_is_noop() {
        let school = School::new();
        let engine = school.engine(InsideEventPolicy::default());
        let mut sample = school.on_campus(7, 15);
        sample.student_id = Uuid::new_v4();

        let report = engine.process_sample(&sample).await.unwrap();
        assert_eq!(report.no_ops[0].reason, NoOpReason::NoEnrollments);
    }

    #[tokio::test]
    async fn test_single_conflict_is_retried() {
        let school = School::new();
        school.store.inject_conflicts(1);
        let engine = school.engine(InsideEventPolicy::default());

        let report = engine.process_sample(&school.on_campus(7, 15)).await.unwrap();

        assert_eq!(event_types(&report), vec![GeofenceTransitionType::Enter]);
        assert_eq!(school.store.events().len(), 1);
        assert_eq!(report.attendance.len(), 2);
    }

    #[tokio::test]
    async fn test_repeated_conflict_is_reported() {
        let school = School::new();
        school.store.inject_conflicts(2);
        let engine = school.engine(InsideEventPolicy::default());

        let err = engine.process_sample(&school.on_campus(7, 15)).await.unwrap_err();

        assert!(matches!(err, EngineError::Conflict { student_id } if student_id == school.student_id));
        assert!(err.is_retryable());
        assert!(school.store.events().is_empty());
        assert!(school.store.attendance_records().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_samples_enter_once() {
        let school = School::new();
        let engine = school.engine(InsideEventPolicy::Never);
        let a = school.on_campus(7, 15);
        let b = school.on_campus(7, 16);

        let (ra, rb) = tokio::join!(engine.process_sample(&a), engine.process_sample(&b));

        let enters = ra
            .into_iter()
            .chain(rb)
            .flat_map(|r| r.events)
            .filter(|e| e.event_type == GeofenceTransitionType::Enter)
            .count();
        assert_eq!(enters, 1);
        assert_eq!(school.store.attendance_records().len(), 2);
    }

    #[tokio::test]
    async fn test_storage_outage_is_retryable() {
        let school = School::new();
        school.store.set_unavailable(true);
        let engine = school.engine(InsideEventPolicy::default());

        let err = engine.process_sample(&school.on_campus(7, 15)).await.unwrap_err();
        assert!(matches!(err, EngineError::Storage(StoreError::Unavailable(_))));
        assert!(err.is_retryable());
    }

    struct LeakyFences(Vec<Geofence>);

    #[async_trait::async_trait]
    impl FenceRepository for LeakyFences {
        async fn active_fences_for(&self, _tenant_id: Uuid) -> Result<Vec<Geofence>, StoreError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_foreign_tenant_fence_aborts_pipeline() {
        let school = School::new();
        let foreign = geofence(
            Uuid::new_v4(),
            FenceType::SchoolGrounds,
            FenceShape::circle(CAMPUS_LAT, CAMPUS_LON, 500.0).unwrap(),
        );
        let engine = AutoAttendanceEngine::new(
            Arc::new(LeakyFences(vec![school.campus.clone(), foreign])),
            school.store.clone(),
            school.store.clone(),
            school.store.clone(),
        );

        let err = engine.process_sample(&school.on_campus(7, 15)).await.unwrap_err();
        assert!(matches!(err, EngineError::TenantIsolation { .. }));
        assert!(!err.is_retryable());
        assert!(school.store.events().is_empty());
    }

    /// Attendance store whose first `failures` upserts report an outage.
    struct FlakyAttendance {
        store: Arc<InMemoryStore>,
        failures: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl AttendanceStore for FlakyAttendance {
        async fn window_for(&self, tenant_id: Uuid) -> Result<Option<AttendanceWindow>, StoreError> {
            self.store.window_for(tenant_id).await
        }

        async fn enrollments_for(
            &self,
            tenant_id: Uuid,
            student_id: Uuid,
        ) -> Result<Vec<ClassEnrollment>, StoreError> {
            self.store.enrollments_for(tenant_id, student_id).await
        }

        async fn upsert_attendance(&self, upsert: &AttendanceUpsert) -> Result<AttendanceRecord, StoreError> {
            if self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(StoreError::Unavailable("attendance_records locked".to_string()));
            }
            self.store.upsert_attendance(upsert).await
        }

        async fn mark_event_processed(
            &self,
            event_id: Uuid,
            processed_at: chrono::DateTime<Utc>,
        ) -> Result<(), StoreError> {
            self.store.mark_event_processed(event_id, processed_at).await
        }
    }

    /// Containment store that refuses every update of one fence while blocked.
    struct ContendedFence {
        store: Arc<InMemoryStore>,
        geofence_id: Uuid,
        blocked: AtomicBool,
    }

    #[async_trait::async_trait]
    impl ContainmentStore for ContendedFence {
        async fn states_for(
            &self,
            tenant_id: Uuid,
            student_id: Uuid,
        ) -> Result<HashMap<Uuid, ContainmentState>, StoreError> {
            self.store.states_for(tenant_id, student_id).await
        }

        async fn apply_transition(&self, transition: &Transition) -> Result<bool, StoreError> {
            if self.blocked.load(Ordering::SeqCst) && transition.state.geofence_id == self.geofence_id {
                return Ok(false);
            }
            self.store.apply_transition(transition).await
        }

        async fn unmarked_entries(
            &self,
            tenant_id: Uuid,
            student_id: Uuid,
            limit: usize,
        ) -> Result<Vec<GeofenceEvent>, StoreError> {
            self.store.unmarked_entries(tenant_id, student_id, limit).await
        }
    }

    #[tokio::test]
    async fn test_resubmit_after_attendance_outage_marks_entry() {
        let school = School::new();
        let attendance = Arc::new(FlakyAttendance {
            store: school.store.clone(),
            failures: AtomicUsize::new(1),
        });
        let engine = AutoAttendanceEngine::new(
            school.store.clone(),
            school.store.clone(),
            school.store.clone(),
            attendance,
        );
        let sample = school.on_campus(7, 15);

        let err = engine.process_sample(&sample).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(school.store.attendance_records().is_empty());
        let entry = school.store.events()[0].clone();
        assert!(entry.processed_at.is_none());

        let retry = engine.process_sample(&sample).await.unwrap();

        assert!(retry.events.is_empty());
        assert_eq!(retry.skipped, vec![school.campus.id]);
        assert_eq!(retry.recovered, vec![entry.event_id]);
        assert_eq!(retry.attendance.len(), 2);
        assert!(retry
            .attendance
            .iter()
            .all(|r| r.status == AttendanceStatus::Present));
        assert!(school.store.events()[0].processed_at.is_some());
        assert_eq!(school.store.samples().len(), 1);

        let later = engine.process_sample(&school.on_campus(7, 20)).await.unwrap();
        assert!(later.recovered.is_empty());
        assert_eq!(school.store.attendance_writes(), 2);
    }

    #[tokio::test]
    async fn test_entry_applied_before_conflict_is_marked_on_resubmit() {
        let school = School::new();
        let classroom = geofence(
            school.tenant_id,
            FenceType::Classroom,
            FenceShape::circle(CAMPUS_LAT, CAMPUS_LON, 15.0).unwrap(),
        );
        school.store.put_fence(classroom.clone());
        let containment = Arc::new(ContendedFence {
            store: school.store.clone(),
            geofence_id: classroom.id,
            blocked: AtomicBool::new(true),
        });
        let engine = AutoAttendanceEngine::new(
            school.store.clone(),
            school.store.clone(),
            containment.clone(),
            school.store.clone(),
        );
        let sample = school.on_campus(7, 15);

        let err = engine.process_sample(&sample).await.unwrap_err();
        assert!(matches!(err, EngineError::Conflict { .. }));
        let events = school.store.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].geofence_id, school.campus.id);
        assert!(school.store.attendance_records().is_empty());

        containment.blocked.store(false, Ordering::SeqCst);
        let retry = engine.process_sample(&sample).await.unwrap();

        assert_eq!(event_types(&retry), vec![GeofenceTransitionType::Enter]);
        assert_eq!(retry.events[0].geofence_id, classroom.id);
        assert_eq!(retry.recovered, vec![events[0].event_id]);
        assert_eq!(retry.attendance.len(), 2);
        assert_eq!(school.store.attendance_records().len(), 2);
        assert!(school.store.events().iter().all(|e| e.processed_at.is_some()));
    }
}
