//! Geofence event repository for database operations.

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use domain::models::GeofenceEvent;

use crate::entities::GeofenceEventEntity;
use crate::metrics::QueryTimer;

/// Appends one event on an existing connection or transaction.
pub async fn insert_event(conn: &mut PgConnection, event: &GeofenceEvent) -> Result<(), sqlx::Error> {
    let timer = QueryTimer::new("insert_geofence_event");
    let result = sqlx::query(
        r#"
        INSERT INTO geofence_events (event_id, tenant_id, student_id, geofence_id, event_type,
                                     latitude, longitude, accuracy, occurred_at, processed_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(event.event_id)
    .bind(event.tenant_id)
    .bind(event.student_id)
    .bind(event.geofence_id)
    .bind(event.event_type.as_str())
    .bind(event.latitude)
    .bind(event.longitude)
    .bind(event.accuracy)
    .bind(event.occurred_at)
    .bind(event.processed_at)
    .execute(conn)
    .await;
    timer.record();
    result.map(|_| ())
}

/// Oldest ENTER events of a student on active school-grounds fences whose
/// attendance has not been marked yet.
pub async fn find_unmarked_entries(
    pool: &PgPool,
    tenant_id: Uuid,
    student_id: Uuid,
    limit: i64,
) -> Result<Vec<GeofenceEventEntity>, sqlx::Error> {
    let timer = QueryTimer::new("find_unmarked_geofence_entries");
    let result = sqlx::query_as::<_, GeofenceEventEntity>(
        r#"
        SELECT e.* FROM geofence_events e
        JOIN geofences g ON g.id = e.geofence_id AND g.tenant_id = e.tenant_id
        WHERE e.tenant_id = $1 AND e.student_id = $2
          AND e.event_type = 'ENTER' AND e.processed_at IS NULL
          AND g.active AND g.fence_type = 'SCHOOL_GROUNDS'
        ORDER BY e.occurred_at, e.event_id
        LIMIT $3
        "#,
    )
    .bind(tenant_id)
    .bind(student_id)
    .bind(limit)
    .fetch_all(pool)
    .await;
    timer.record();
    result
}

/// Repository for reading the geofence event log.
#[derive(Clone)]
pub struct GeofenceEventRepository {
    pool: PgPool,
}

impl GeofenceEventRepository {
    /// Creates a new GeofenceEventRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Newest events of a tenant, optionally narrowed to a student or fence.
    pub async fn list(
        &self,
        tenant_id: Uuid,
        student_id: Option<Uuid>,
        geofence_id: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<GeofenceEventEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_geofence_events");
        let result = sqlx::query_as::<_, GeofenceEventEntity>(
            r#"
            SELECT * FROM geofence_events
            WHERE tenant_id = $1
              AND ($2::uuid IS NULL OR student_id = $2)
              AND ($3::uuid IS NULL OR geofence_id = $3)
            ORDER BY occurred_at DESC, event_id
            LIMIT $4
            "#,
        )
        .bind(tenant_id)
        .bind(student_id)
        .bind(geofence_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Count of events matching the same filters as [`list`](Self::list).
    pub async fn count(
        &self,
        tenant_id: Uuid,
        student_id: Option<Uuid>,
        geofence_id: Option<Uuid>,
    ) -> Result<i64, sqlx::Error> {
        let timer = QueryTimer::new("count_geofence_events");
        let count: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM geofence_events
            WHERE tenant_id = $1
              AND ($2::uuid IS NULL OR student_id = $2)
              AND ($3::uuid IS NULL OR geofence_id = $3)
            "#,
        )
        .bind(tenant_id)
        .bind(student_id)
        .bind(geofence_id)
        .fetch_one(&self.pool)
        .await?;
        timer.record();
        Ok(count.0)
    }
}
