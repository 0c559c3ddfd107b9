//! Attendance repository for database operations.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use domain::errors::StoreError;
use domain::models::{AttendanceRecord, AttendanceUpsert, AttendanceWindow, ClassEnrollment};
use domain::services::AttendanceStore;

use crate::entities::{AttendanceRecordEntity, AttendanceSettingsEntity, ClassEnrollmentEntity};
use crate::metrics::QueryTimer;
use crate::store_error;

/// Repository for attendance records, tenant windows and enrollments.
#[derive(Clone)]
pub struct AttendanceRepository {
    pool: PgPool,
}

impl AttendanceRepository {
    /// Creates a new AttendanceRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert-or-merge in a single statement.
    ///
    /// On conflict an existing PRESENT is kept over LATE, the audit note is
    /// appended unless already present, and `updated_at` only moves when the
    /// row actually changes.
    pub async fn upsert(&self, upsert: &AttendanceUpsert) -> Result<AttendanceRecordEntity, sqlx::Error> {
        let timer = QueryTimer::new("upsert_attendance");
        let result = sqlx::query_as::<_, AttendanceRecordEntity>(
            r#"
            INSERT INTO attendance_records (tenant_id, student_id, class_id, date, status, notes)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (tenant_id, student_id, class_id, date) DO UPDATE SET
                status = CASE
                    WHEN attendance_records.status = 'PRESENT' AND EXCLUDED.status = 'LATE'
                        THEN attendance_records.status
                    ELSE EXCLUDED.status
                END,
                notes = CASE
                    WHEN attendance_records.notes IS NULL OR btrim(attendance_records.notes) = ''
                        THEN EXCLUDED.notes
                    WHEN strpos(attendance_records.notes, EXCLUDED.notes) > 0
                        THEN attendance_records.notes
                    ELSE attendance_records.notes || E'\n' || EXCLUDED.notes
                END,
                updated_at = CASE
                    WHEN (attendance_records.status = 'PRESENT' AND EXCLUDED.status = 'LATE'
                            OR attendance_records.status = EXCLUDED.status)
                        AND attendance_records.notes IS NOT NULL
                        AND strpos(attendance_records.notes, EXCLUDED.notes) > 0
                        AND btrim(attendance_records.notes) <> ''
                        THEN attendance_records.updated_at
                    ELSE NOW()
                END
            RETURNING *
            "#,
        )
        .bind(upsert.tenant_id)
        .bind(upsert.student_id)
        .bind(upsert.class_id)
        .bind(upsert.date)
        .bind(upsert.status.as_str())
        .bind(&upsert.note)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Records of one student on one day.
    pub async fn find_by_student_and_date(
        &self,
        tenant_id: Uuid,
        student_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<AttendanceRecordEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_attendance_by_student_and_date");
        let result = sqlx::query_as::<_, AttendanceRecordEntity>(
            r#"
            SELECT * FROM attendance_records
            WHERE tenant_id = $1 AND student_id = $2 AND date = $3
            ORDER BY class_id
            "#,
        )
        .bind(tenant_id)
        .bind(student_id)
        .bind(date)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Active class enrollments of a student.
    pub async fn find_enrollments(
        &self,
        tenant_id: Uuid,
        student_id: Uuid,
    ) -> Result<Vec<ClassEnrollmentEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_class_enrollments");
        let result = sqlx::query_as::<_, ClassEnrollmentEntity>(
            r#"
            SELECT tenant_id, class_id FROM class_enrollments
            WHERE tenant_id = $1 AND student_id = $2 AND active
            ORDER BY class_id
            "#,
        )
        .bind(tenant_id)
        .bind(student_id)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Stored attendance window of a tenant.
    pub async fn find_settings(
        &self,
        tenant_id: Uuid,
    ) -> Result<Option<AttendanceSettingsEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_attendance_settings");
        let result = sqlx::query_as::<_, AttendanceSettingsEntity>(
            r#"
            SELECT * FROM attendance_settings WHERE tenant_id = $1
            "#,
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Creates or replaces the attendance window of a tenant.
    pub async fn upsert_settings(
        &self,
        tenant_id: Uuid,
        window: &AttendanceWindow,
    ) -> Result<AttendanceSettingsEntity, sqlx::Error> {
        let timer = QueryTimer::new("upsert_attendance_settings");
        let result = sqlx::query_as::<_, AttendanceSettingsEntity>(
            r#"
            INSERT INTO attendance_settings (tenant_id, window_start, window_end, late_cutoff,
                                             utc_offset_minutes)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (tenant_id) DO UPDATE SET
                window_start = EXCLUDED.window_start,
                window_end = EXCLUDED.window_end,
                late_cutoff = EXCLUDED.late_cutoff,
                utc_offset_minutes = EXCLUDED.utc_offset_minutes,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(window.start)
        .bind(window.end)
        .bind(window.late_cutoff)
        .bind(window.utc_offset_minutes)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Sets `processed_at` once; later calls keep the first stamp.
    pub async fn mark_processed(
        &self,
        event_id: Uuid,
        processed_at: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("mark_geofence_event_processed");
        let result = sqlx::query(
            r#"
            UPDATE geofence_events SET processed_at = $2
            WHERE event_id = $1 AND processed_at IS NULL
            "#,
        )
        .bind(event_id)
        .bind(processed_at)
        .execute(&self.pool)
        .await?;
        timer.record();
        Ok(result.rows_affected())
    }
}

#[async_trait::async_trait]
impl AttendanceStore for AttendanceRepository {
    async fn window_for(&self, tenant_id: Uuid) -> Result<Option<AttendanceWindow>, StoreError> {
        Ok(self
            .find_settings(tenant_id)
            .await
            .map_err(store_error)?
            .map(AttendanceWindow::from))
    }

    async fn enrollments_for(
        &self,
        tenant_id: Uuid,
        student_id: Uuid,
    ) -> Result<Vec<ClassEnrollment>, StoreError> {
        Ok(self
            .find_enrollments(tenant_id, student_id)
            .await
            .map_err(store_error)?
            .into_iter()
            .map(ClassEnrollment::from)
            .collect())
    }

    async fn upsert_attendance(&self, upsert: &AttendanceUpsert) -> Result<AttendanceRecord, StoreError> {
        self.upsert(upsert)
            .await
            .map_err(store_error)?
            .try_into()
    }

    async fn mark_event_processed(
        &self,
        event_id: Uuid,
        processed_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.mark_processed(event_id, processed_at)
            .await
            .map(|_| ())
            .map_err(store_error)
    }
}
