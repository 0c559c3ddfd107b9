//! Geofence administration handlers.
//!
//! Every mutation invalidates the tenant's cached fences so the next sample
//! is evaluated against the new geometry.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use domain::models::geofence::{
    CreateGeofenceRequest, GeofenceResponse, ListGeofencesQuery, ListGeofencesResponse,
    UpdateGeofenceRequest,
};
use domain::models::Geofence;
use persistence::entities::GeofenceEntity;
use persistence::repositories::{GeofenceChanges, GeofenceRepository};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::TenantContext;

fn to_response(entity: GeofenceEntity) -> Result<GeofenceResponse, ApiError> {
    Ok(Geofence::try_from(entity)?.into())
}

/// Create a geofence.
///
/// POST /api/v1/geofences
pub async fn create_geofence(
    State(state): State<AppState>,
    context: TenantContext,
    Json(request): Json<CreateGeofenceRequest>,
) -> Result<(StatusCode, Json<GeofenceResponse>), ApiError> {
    request.validate()?;

    let repo = GeofenceRepository::new(state.pool.clone());
    let entity = repo
        .create(
            context.tenant_id,
            &request.name,
            request.fence_type,
            &request.shape,
            request.active,
        )
        .await?;
    state.fence_cache.invalidate(context.tenant_id).await;

    info!(
        tenant_id = %context.tenant_id,
        geofence_id = %entity.id,
        fence_type = %request.fence_type.as_str(),
        "Geofence created"
    );

    Ok((StatusCode::CREATED, Json(to_response(entity)?)))
}

/// List a tenant's geofences.
///
/// GET /api/v1/geofences?includeInactive=true
pub async fn list_geofences(
    State(state): State<AppState>,
    context: TenantContext,
    Query(query): Query<ListGeofencesQuery>,
) -> Result<Json<ListGeofencesResponse>, ApiError> {
    let repo = GeofenceRepository::new(state.pool.clone());
    let geofences = repo
        .find_by_tenant(context.tenant_id, query.include_inactive)
        .await?
        .into_iter()
        .map(to_response)
        .collect::<Result<Vec<_>, _>>()?;

    let total = geofences.len();
    Ok(Json(ListGeofencesResponse { geofences, total }))
}

/// Fetch one geofence.
///
/// GET /api/v1/geofences/:geofence_id
pub async fn get_geofence(
    State(state): State<AppState>,
    context: TenantContext,
    Path(geofence_id): Path<Uuid>,
) -> Result<Json<GeofenceResponse>, ApiError> {
    let repo = GeofenceRepository::new(state.pool.clone());
    let entity = repo
        .find_by_id(context.tenant_id, geofence_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Geofence not found".to_string()))?;

    Ok(Json(to_response(entity)?))
}

/// Partially update a geofence. A new shape replaces the old one entirely.
///
/// PATCH /api/v1/geofences/:geofence_id
pub async fn update_geofence(
    State(state): State<AppState>,
    context: TenantContext,
    Path(geofence_id): Path<Uuid>,
    Json(request): Json<UpdateGeofenceRequest>,
) -> Result<Json<GeofenceResponse>, ApiError> {
    request.validate()?;

    let repo = GeofenceRepository::new(state.pool.clone());
    let changes = GeofenceChanges {
        name: request.name.as_deref(),
        fence_type: request.fence_type,
        active: request.active,
        shape: request.shape.as_ref(),
    };
    let entity = repo
        .update(context.tenant_id, geofence_id, changes)
        .await?
        .ok_or_else(|| ApiError::NotFound("Geofence not found".to_string()))?;
    state.fence_cache.invalidate(context.tenant_id).await;

    info!(tenant_id = %context.tenant_id, geofence_id = %geofence_id, "Geofence updated");

    Ok(Json(to_response(entity)?))
}

/// Deactivate a geofence. Its events and containment history are kept.
///
/// DELETE /api/v1/geofences/:geofence_id
pub async fn delete_geofence(
    State(state): State<AppState>,
    context: TenantContext,
    Path(geofence_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let repo = GeofenceRepository::new(state.pool.clone());

    if repo.deactivate(context.tenant_id, geofence_id).await? == 0 {
        // Already inactive fences delete idempotently.
        repo.find_by_id(context.tenant_id, geofence_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Geofence not found".to_string()))?;
        return Ok(StatusCode::NO_CONTENT);
    }
    state.fence_cache.invalidate(context.tenant_id).await;

    info!(tenant_id = %context.tenant_id, geofence_id = %geofence_id, "Geofence deactivated");

    Ok(StatusCode::NO_CONTENT)
}
