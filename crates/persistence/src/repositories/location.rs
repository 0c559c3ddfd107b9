//! Location sample repository for database operations.

use sqlx::PgPool;

use domain::errors::StoreError;
use domain::models::LocationSample;
use domain::services::LocationLog;

use crate::metrics::QueryTimer;
use crate::store_error;

/// Repository for the append-only location sample log.
#[derive(Clone)]
pub struct LocationRepository {
    pool: PgPool,
}

impl LocationRepository {
    /// Creates a new LocationRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Appends one sample. Returns `false` when the same capture was already stored.
    pub async fn insert(&self, sample: &LocationSample) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("insert_location_sample");
        let result = sqlx::query(
            r#"
            INSERT INTO location_samples (tenant_id, student_id, latitude, longitude,
                                          accuracy, battery_percent, device_id, captured_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (tenant_id, student_id, captured_at) DO NOTHING
            "#,
        )
        .bind(sample.tenant_id)
        .bind(sample.student_id)
        .bind(sample.latitude)
        .bind(sample.longitude)
        .bind(sample.accuracy)
        .bind(sample.battery_percent)
        .bind(sample.device_id.as_deref())
        .bind(sample.captured_at)
        .execute(&self.pool)
        .await;
        timer.record();
        Ok(result?.rows_affected() > 0)
    }

    /// Deletes up to `batch_size` samples older than the retention period.
    pub async fn delete_expired_batch(
        &self,
        retention_days: u32,
        batch_size: i64,
    ) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("delete_expired_location_samples");
        let result = sqlx::query(
            r#"
            WITH to_delete AS (
                SELECT id FROM location_samples
                WHERE created_at < NOW() - make_interval(days => $1)
                LIMIT $2
            )
            DELETE FROM location_samples
            WHERE id IN (SELECT id FROM to_delete)
            "#,
        )
        .bind(retention_days as i32)
        .bind(batch_size)
        .execute(&self.pool)
        .await?;
        timer.record();
        Ok(result.rows_affected())
    }
}

#[async_trait::async_trait]
impl LocationLog for LocationRepository {
    async fn append(&self, sample: &LocationSample) -> Result<(), StoreError> {
        if !self.insert(sample).await.map_err(store_error)? {
            tracing::debug!(
                tenant_id = %sample.tenant_id,
                student_id = %sample.student_id,
                captured_at = %sample.captured_at,
                "Location sample already stored"
            );
        }
        Ok(())
    }
}
