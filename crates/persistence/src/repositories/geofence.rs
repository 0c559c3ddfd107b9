//! Geofence repository for database operations.

use sqlx::PgPool;
use uuid::Uuid;

use domain::errors::StoreError;
use domain::models::{FenceShape, FenceType, Geofence};
use domain::services::FenceRepository;

use crate::entities::{GeofenceEntity, ShapeColumns};
use crate::metrics::QueryTimer;
use crate::store_error;

/// Fields of a partial geofence update. `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct GeofenceChanges<'a> {
    pub name: Option<&'a str>,
    pub fence_type: Option<FenceType>,
    pub active: Option<bool>,
    /// Replaces the whole shape, switching variant if needed.
    pub shape: Option<&'a FenceShape>,
}

/// Repository for geofence-related database operations.
#[derive(Clone)]
pub struct GeofenceRepository {
    pool: PgPool,
}

impl GeofenceRepository {
    /// Creates a new GeofenceRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new geofence.
    pub async fn create(
        &self,
        tenant_id: Uuid,
        name: &str,
        fence_type: FenceType,
        shape: &FenceShape,
        active: bool,
    ) -> Result<GeofenceEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_geofence");
        let columns = ShapeColumns::from(shape);
        let result = sqlx::query_as::<_, GeofenceEntity>(
            r#"
            INSERT INTO geofences (id, tenant_id, name, fence_type, active,
                                   center_latitude, center_longitude, radius_meters, polygon)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(tenant_id)
        .bind(name)
        .bind(fence_type.as_str())
        .bind(active)
        .bind(columns.center_latitude)
        .bind(columns.center_longitude)
        .bind(columns.radius_meters)
        .bind(columns.polygon)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Find a tenant's geofence by id.
    pub async fn find_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<GeofenceEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_geofence_by_id");
        let result = sqlx::query_as::<_, GeofenceEntity>(
            r#"
            SELECT * FROM geofences WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Find all geofences of a tenant.
    pub async fn find_by_tenant(
        &self,
        tenant_id: Uuid,
        include_inactive: bool,
    ) -> Result<Vec<GeofenceEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_geofences_by_tenant");
        let result = sqlx::query_as::<_, GeofenceEntity>(
            r#"
            SELECT * FROM geofences
            WHERE tenant_id = $1 AND (active OR $2)
            ORDER BY created_at DESC, id
            "#,
        )
        .bind(tenant_id)
        .bind(include_inactive)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Partial update. Returns `None` when the fence does not exist for the tenant.
    pub async fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        changes: GeofenceChanges<'_>,
    ) -> Result<Option<GeofenceEntity>, sqlx::Error> {
        let timer = QueryTimer::new("update_geofence");
        let columns = changes.shape.map(ShapeColumns::from);
        let replace_shape = columns.is_some();
        let columns = columns.unwrap_or(ShapeColumns {
            center_latitude: None,
            center_longitude: None,
            radius_meters: None,
            polygon: None,
        });

        let result = sqlx::query_as::<_, GeofenceEntity>(
            r#"
            UPDATE geofences SET
                name = COALESCE($3, name),
                fence_type = COALESCE($4, fence_type),
                active = COALESCE($5, active),
                center_latitude = CASE WHEN $6 THEN $7 ELSE center_latitude END,
                center_longitude = CASE WHEN $6 THEN $8 ELSE center_longitude END,
                radius_meters = CASE WHEN $6 THEN $9 ELSE radius_meters END,
                polygon = CASE WHEN $6 THEN $10 ELSE polygon END,
                updated_at = NOW()
            WHERE tenant_id = $1 AND id = $2
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(id)
        .bind(changes.name)
        .bind(changes.fence_type.map(|t| t.as_str()))
        .bind(changes.active)
        .bind(replace_shape)
        .bind(columns.center_latitude)
        .bind(columns.center_longitude)
        .bind(columns.radius_meters)
        .bind(columns.polygon)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Soft-deletes a fence. Events and containment rows stay for audit.
    /// Returns the number of rows changed (0 or 1).
    pub async fn deactivate(&self, tenant_id: Uuid, id: Uuid) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("deactivate_geofence");
        let result = sqlx::query(
            r#"
            UPDATE geofences SET active = FALSE, updated_at = NOW()
            WHERE tenant_id = $1 AND id = $2 AND active
            "#,
        )
        .bind(tenant_id)
        .bind(id)
        .execute(&self.pool)
        .await?;
        timer.record();
        Ok(result.rows_affected())
    }
}

#[async_trait::async_trait]
impl FenceRepository for GeofenceRepository {
    async fn active_fences_for(&self, tenant_id: Uuid) -> Result<Vec<Geofence>, StoreError> {
        self.find_by_tenant(tenant_id, false)
            .await
            .map_err(store_error)?
            .into_iter()
            .map(Geofence::try_from)
            .collect()
    }
}
