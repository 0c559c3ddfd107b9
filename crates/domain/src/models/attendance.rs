//! Attendance domain models.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Offset, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Attendance status of a student for one class on one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceStatus {
    Present,
    Late,
    Absent,
    Excused,
}

impl AttendanceStatus {
    /// Converts to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "PRESENT",
            AttendanceStatus::Late => "LATE",
            AttendanceStatus::Absent => "ABSENT",
            AttendanceStatus::Excused => "EXCUSED",
        }
    }

    /// Parses from database string representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PRESENT" => Some(AttendanceStatus::Present),
            "LATE" => Some(AttendanceStatus::Late),
            "ABSENT" => Some(AttendanceStatus::Absent),
            "EXCUSED" => Some(AttendanceStatus::Excused),
            _ => None,
        }
    }
}

impl std::fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One attendance row, unique per (tenant, student, class, date).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub tenant_id: Uuid,
    pub student_id: Uuid,
    pub class_id: Uuid,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub notes: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// A class the student is currently enrolled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassEnrollment {
    pub tenant_id: Uuid,
    pub class_id: Uuid,
}

/// Write produced by the attendance marker for one class.
#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceUpsert {
    pub tenant_id: Uuid,
    pub student_id: Uuid,
    pub class_id: Uuid,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    /// Audit line recording the auto-mark source and time.
    pub note: String,
}

/// Why the marker declined to write attendance for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NoOpReason {
    OutsideWindow,
    WrongEventType,
    WrongFenceType,
    NoEnrollments,
}

impl NoOpReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoOpReason::OutsideWindow => "OUTSIDE_WINDOW",
            NoOpReason::WrongEventType => "WRONG_EVENT_TYPE",
            NoOpReason::WrongFenceType => "WRONG_FENCE_TYPE",
            NoOpReason::NoEnrollments => "NO_ENROLLMENTS",
        }
    }
}

impl std::fmt::Display for NoOpReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Local time-of-day window in which an ENTER event auto-marks attendance.
///
/// Entries in `[start, late_cutoff)` are PRESENT, entries in `[late_cutoff, end)`
/// are LATE, everything else is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub late_cutoff: NaiveTime,
    /// Offset of the school's local time from UTC.
    pub utc_offset_minutes: i32,
}

impl Default for AttendanceWindow {
    fn default() -> Self {
        Self {
            start: NaiveTime::from_hms_opt(7, 0, 0).unwrap_or_default(),
            end: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
            late_cutoff: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or_default(),
            utc_offset_minutes: 0,
        }
    }
}

impl AttendanceWindow {
    /// Checks `start < end`, `start <= late_cutoff <= end` and the offset range.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.start >= self.end {
            let mut err = ValidationError::new("window_order");
            err.message = Some("Window start must be before window end".into());
            return Err(err);
        }
        if self.late_cutoff < self.start || self.late_cutoff > self.end {
            let mut err = ValidationError::new("late_cutoff_range");
            err.message = Some("Late cutoff must fall within the window".into());
            return Err(err);
        }
        if !(-720..=840).contains(&self.utc_offset_minutes) {
            let mut err = ValidationError::new("utc_offset_range");
            err.message = Some("UTC offset must be between -720 and 840 minutes".into());
            return Err(err);
        }
        Ok(())
    }

    /// The school's fixed offset. Falls back to UTC for an out-of-range offset.
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }

    /// Converts an instant to the school's local time.
    pub fn local(&self, at: DateTime<Utc>) -> DateTime<FixedOffset> {
        at.with_timezone(&self.offset())
    }
}

/// Applies an upsert on top of an existing row, producing the stored result.
///
/// An existing PRESENT is never downgraded to LATE, so several ENTER events on
/// one day converge regardless of processing order. The audit note is appended
/// to prior free-text notes and only once.
pub fn merge_attendance(
    existing: Option<&AttendanceRecord>,
    upsert: &AttendanceUpsert,
    now: DateTime<Utc>,
) -> AttendanceRecord {
    let Some(existing) = existing else {
        return AttendanceRecord {
            tenant_id: upsert.tenant_id,
            student_id: upsert.student_id,
            class_id: upsert.class_id,
            date: upsert.date,
            status: upsert.status,
            notes: Some(upsert.note.clone()),
            updated_at: now,
        };
    };

    let status = match (existing.status, upsert.status) {
        (AttendanceStatus::Present, AttendanceStatus::Late) => AttendanceStatus::Present,
        (_, status) => status,
    };

    let notes = match existing.notes.as_deref() {
        None => upsert.note.clone(),
        Some(prior) if prior.trim().is_empty() => upsert.note.clone(),
        Some(prior) if prior.contains(&upsert.note) => prior.to_string(),
        Some(prior) => format!("{}\n{}", prior, upsert.note),
    };

    let unchanged = status == existing.status && existing.notes.as_deref() == Some(notes.as_str());
    AttendanceRecord {
        status,
        notes: Some(notes),
        updated_at: if unchanged { existing.updated_at } else { now },
        ..existing.clone()
    }
}

/// Request payload for setting a tenant's attendance window.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSettingsRequest {
    #[validate(custom(function = "shared::validation::validate_time_of_day"))]
    pub start: String,

    #[validate(custom(function = "shared::validation::validate_time_of_day"))]
    pub end: String,

    #[validate(custom(function = "shared::validation::validate_time_of_day"))]
    pub late_cutoff: String,

    #[serde(default)]
    #[validate(range(min = -720, max = 840, message = "UTC offset must be between -720 and 840 minutes"))]
    pub utc_offset_minutes: i32,
}

impl AttendanceSettingsRequest {
    /// Parses the request into a validated window.
    pub fn to_window(&self) -> Result<AttendanceWindow, ValidationError> {
        let window = AttendanceWindow {
            start: shared::validation::parse_time_of_day(&self.start)?,
            end: shared::validation::parse_time_of_day(&self.end)?,
            late_cutoff: shared::validation::parse_time_of_day(&self.late_cutoff)?,
            utc_offset_minutes: self.utc_offset_minutes,
        };
        window.validate()?;
        Ok(window)
    }
}

/// Response payload for attendance settings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSettingsResponse {
    pub start: String,
    pub end: String,
    pub late_cutoff: String,
    pub utc_offset_minutes: i32,
    /// True when the tenant has no stored window and the service default applies.
    pub is_default: bool,
}

impl AttendanceSettingsResponse {
    pub fn new(window: AttendanceWindow, is_default: bool) -> Self {
        Self {
            start: window.start.format("%H:%M").to_string(),
            end: window.end.format("%H:%M").to_string(),
            late_cutoff: window.late_cutoff.format("%H:%M").to_string(),
            utc_offset_minutes: window.utc_offset_minutes,
            is_default,
        }
    }
}
