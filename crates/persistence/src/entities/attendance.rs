//! Attendance entities (database row mappings).

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use domain::errors::StoreError;
use domain::models::{AttendanceRecord, AttendanceStatus, AttendanceWindow, ClassEnrollment};

/// Database row mapping for the attendance_records table.
#[derive(Debug, Clone, FromRow)]
pub struct AttendanceRecordEntity {
    pub tenant_id: Uuid,
    pub student_id: Uuid,
    pub class_id: Uuid,
    pub date: NaiveDate,
    pub status: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<AttendanceRecordEntity> for AttendanceRecord {
    type Error = StoreError;

    fn try_from(entity: AttendanceRecordEntity) -> Result<Self, Self::Error> {
        let status = AttendanceStatus::parse(&entity.status).ok_or_else(|| {
            StoreError::Corrupt(format!("attendance record: unknown status {}", entity.status))
        })?;

        Ok(Self {
            tenant_id: entity.tenant_id,
            student_id: entity.student_id,
            class_id: entity.class_id,
            date: entity.date,
            status,
            notes: entity.notes,
            updated_at: entity.updated_at,
        })
    }
}

/// Database row mapping for the attendance_settings table.
#[derive(Debug, Clone, FromRow)]
pub struct AttendanceSettingsEntity {
    pub tenant_id: Uuid,
    pub window_start: NaiveTime,
    pub window_end: NaiveTime,
    pub late_cutoff: NaiveTime,
    pub utc_offset_minutes: i32,
    pub updated_at: DateTime<Utc>,
}

impl From<AttendanceSettingsEntity> for AttendanceWindow {
    fn from(entity: AttendanceSettingsEntity) -> Self {
        Self {
            start: entity.window_start,
            end: entity.window_end,
            late_cutoff: entity.late_cutoff,
            utc_offset_minutes: entity.utc_offset_minutes,
        }
    }
}

/// Database row mapping for the class_enrollments table.
#[derive(Debug, Clone, FromRow)]
pub struct ClassEnrollmentEntity {
    pub tenant_id: Uuid,
    pub class_id: Uuid,
}

impl From<ClassEnrollmentEntity> for ClassEnrollment {
    fn from(entity: ClassEnrollmentEntity) -> Self {
        Self {
            tenant_id: entity.tenant_id,
            class_id: entity.class_id,
        }
    }
}
