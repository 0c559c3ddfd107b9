//! Geofence event listing.

use axum::{
    extract::{Query, State},
    Json,
};
use domain::models::geofence_event::{
    GeofenceEventResponse, ListGeofenceEventsQuery, ListGeofenceEventsResponse,
};
use domain::models::GeofenceEvent;
use persistence::repositories::GeofenceEventRepository;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::TenantContext;

/// List a tenant's events, newest first.
///
/// GET /api/v1/geofence-events?studentId=<uuid>&geofenceId=<uuid>&limit=50
pub async fn list_geofence_events(
    State(state): State<AppState>,
    context: TenantContext,
    Query(query): Query<ListGeofenceEventsQuery>,
) -> Result<Json<ListGeofenceEventsResponse>, ApiError> {
    let max = state.config.limits.max_events_page;
    if query.limit < 1 || query.limit > max {
        return Err(ApiError::Validation(format!(
            "limit must be between 1 and {}",
            max
        )));
    }

    let repo = GeofenceEventRepository::new(state.pool.clone());
    let events = repo
        .list(context.tenant_id, query.student_id, query.geofence_id, query.limit)
        .await?
        .into_iter()
        .map(|entity| GeofenceEvent::try_from(entity).map(GeofenceEventResponse::from))
        .collect::<Result<Vec<_>, _>>()?;
    let total = repo
        .count(context.tenant_id, query.student_id, query.geofence_id)
        .await?;

    Ok(Json(ListGeofenceEventsResponse { events, total }))
}
