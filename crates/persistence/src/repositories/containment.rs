//! Containment state repository for database operations.

use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use domain::errors::StoreError;
use domain::models::{ContainmentState, GeofenceEvent};
use domain::services::{ContainmentStore, Transition};

use crate::entities::ContainmentStateEntity;
use crate::metrics::QueryTimer;
use crate::repositories::geofence_event::{find_unmarked_entries, insert_event};
use crate::store_error;

/// Repository for per-student containment memory.
#[derive(Clone)]
pub struct ContainmentRepository {
    pool: PgPool,
}

impl ContainmentRepository {
    /// Creates a new ContainmentRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// All containment rows of one student.
    pub async fn find_by_student(
        &self,
        tenant_id: Uuid,
        student_id: Uuid,
    ) -> Result<Vec<ContainmentStateEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_containment_by_student");
        let result = sqlx::query_as::<_, ContainmentStateEntity>(
            r#"
            SELECT * FROM containment_states
            WHERE tenant_id = $1 AND student_id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(student_id)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Conditional state write plus event insert in one transaction.
    ///
    /// A first write only succeeds if no row exists yet; later writes only if
    /// `last_evaluated_at` still equals the value the caller read.
    pub async fn apply(&self, transition: &Transition) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("apply_containment_transition");
        let state = &transition.state;
        let mut tx = self.pool.begin().await?;

        let written = match transition.expected_last_evaluated_at {
            None => sqlx::query(
                r#"
                INSERT INTO containment_states (tenant_id, student_id, geofence_id, was_inside,
                                                last_evaluated_at, last_event_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (tenant_id, student_id, geofence_id) DO NOTHING
                "#,
            )
            .bind(state.tenant_id)
            .bind(state.student_id)
            .bind(state.geofence_id)
            .bind(state.was_inside)
            .bind(state.last_evaluated_at)
            .bind(state.last_event_at)
            .execute(&mut *tx)
            .await?
            .rows_affected(),
            Some(expected) => sqlx::query(
                r#"
                UPDATE containment_states
                SET was_inside = $4, last_evaluated_at = $5, last_event_at = $6
                WHERE tenant_id = $1 AND student_id = $2 AND geofence_id = $3
                  AND last_evaluated_at = $7
                "#,
            )
            .bind(state.tenant_id)
            .bind(state.student_id)
            .bind(state.geofence_id)
            .bind(state.was_inside)
            .bind(state.last_evaluated_at)
            .bind(state.last_event_at)
            .bind(expected)
            .execute(&mut *tx)
            .await?
            .rows_affected(),
        };

        if written == 0 {
            tx.rollback().await?;
            timer.record();
            return Ok(false);
        }

        if let Some(event) = &transition.event {
            insert_event(&mut *tx, event).await?;
        }

        tx.commit().await?;
        timer.record();
        Ok(true)
    }
}

#[async_trait::async_trait]
impl ContainmentStore for ContainmentRepository {
    async fn states_for(
        &self,
        tenant_id: Uuid,
        student_id: Uuid,
    ) -> Result<HashMap<Uuid, ContainmentState>, StoreError> {
        Ok(self
            .find_by_student(tenant_id, student_id)
            .await
            .map_err(store_error)?
            .into_iter()
            .map(|e| (e.geofence_id, ContainmentState::from(e)))
            .collect())
    }

    async fn apply_transition(&self, transition: &Transition) -> Result<bool, StoreError> {
        self.apply(transition).await.map_err(store_error)
    }

    async fn unmarked_entries(
        &self,
        tenant_id: Uuid,
        student_id: Uuid,
        limit: usize,
    ) -> Result<Vec<GeofenceEvent>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        find_unmarked_entries(&self.pool, tenant_id, student_id, limit)
            .await
            .map_err(store_error)?
            .into_iter()
            .map(GeofenceEvent::try_from)
            .collect()
    }
}
