//! Attendance marker.
//!
//! Maps an ENTER event on school grounds to PRESENT or LATE attendance for
//! every class the student is enrolled in. The returned upserts are applied by
//! an [`AttendanceStore`](crate::services::store::AttendanceStore), whose
//! upsert is the concurrency boundary.

use std::collections::BTreeSet;

use crate::errors::EngineError;
use crate::models::{
    AttendanceStatus, AttendanceUpsert, AttendanceWindow, ClassEnrollment, FenceType, Geofence,
    GeofenceEvent, GeofenceTransitionType, NoOpReason,
};

/// Result of marking attendance for one event.
#[derive(Debug, Clone, PartialEq)]
pub enum MarkOutcome {
    /// One upsert per enrolled class.
    Marked(Vec<AttendanceUpsert>),
    NoOp(NoOpReason),
}

impl MarkOutcome {
    pub fn upserts(&self) -> &[AttendanceUpsert] {
        match self {
            MarkOutcome::Marked(upserts) => upserts,
            MarkOutcome::NoOp(_) => &[],
        }
    }
}

/// Decides the attendance writes for `event`.
///
/// Errors only on tenant isolation violations. Every other reason not to mark
/// is an explicit [`MarkOutcome::NoOp`].
pub fn mark(
    event: &GeofenceEvent,
    fence: &Geofence,
    window: &AttendanceWindow,
    enrollments: &[ClassEnrollment],
) -> Result<MarkOutcome, EngineError> {
    if fence.tenant_id != event.tenant_id {
        tracing::error!(
            tenant_id = %event.tenant_id,
            geofence_id = %fence.id,
            fence_tenant_id = %fence.tenant_id,
            "Foreign-tenant geofence passed to marker"
        );
        return Err(EngineError::TenantIsolation {
            entity: "geofence",
            entity_id: fence.id,
            expected: event.tenant_id,
            found: fence.tenant_id,
        });
    }
    if let Some(foreign) = enrollments.iter().find(|e| e.tenant_id != event.tenant_id) {
        tracing::error!(
            tenant_id = %event.tenant_id,
            class_id = %foreign.class_id,
            enrollment_tenant_id = %foreign.tenant_id,
            "Foreign-tenant enrollment passed to marker"
        );
        return Err(EngineError::TenantIsolation {
            entity: "enrollment",
            entity_id: foreign.class_id,
            expected: event.tenant_id,
            found: foreign.tenant_id,
        });
    }

    let local = window.local(event.occurred_at);
    let time = local.time();

    let status = if event.event_type != GeofenceTransitionType::Enter {
        Err(NoOpReason::WrongEventType)
    } else if fence.fence_type != FenceType::SchoolGrounds {
        Err(NoOpReason::WrongFenceType)
    } else if time < window.start || time >= window.end {
        Err(NoOpReason::OutsideWindow)
    } else if enrollments.is_empty() {
        Err(NoOpReason::NoEnrollments)
    } else if time < window.late_cutoff {
        Ok(AttendanceStatus::Present)
    } else {
        Ok(AttendanceStatus::Late)
    };

    let status = match status {
        Ok(status) => status,
        Err(reason) => {
            tracing::info!(
                tenant_id = %event.tenant_id,
                student_id = %event.student_id,
                geofence_id = %fence.id,
                event_type = %event.event_type,
                fence_type = %fence.fence_type,
                reason = %reason,
                "Attendance not marked"
            );
            return Ok(MarkOutcome::NoOp(reason));
        }
    };

    let note = format!(
        "Auto-marked {} by geofence entry at {}",
        status,
        local.format("%Y-%m-%d %H:%M %:z")
    );

    let class_ids: BTreeSet<_> = enrollments.iter().map(|e| e.class_id).collect();
    let upserts = class_ids
        .into_iter()
        .map(|class_id| AttendanceUpsert {
            tenant_id: event.tenant_id,
            student_id: event.student_id,
            class_id,
            date: local.date_naive(),
            status,
            note: note.clone(),
        })
        .collect();

    Ok(MarkOutcome::Marked(upserts))
}
