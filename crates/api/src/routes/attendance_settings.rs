//! Per-tenant attendance window.

use axum::{extract::State, Json};
use domain::models::attendance::{AttendanceSettingsRequest, AttendanceSettingsResponse};
use persistence::repositories::AttendanceRepository;
use tracing::info;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::TenantContext;

/// Window in force for the tenant, falling back to the service default.
///
/// GET /api/v1/attendance-settings
pub async fn get_attendance_settings(
    State(state): State<AppState>,
    context: TenantContext,
) -> Result<Json<AttendanceSettingsResponse>, ApiError> {
    let (window, is_default) = state.engine.effective_window(context.tenant_id).await?;
    Ok(Json(AttendanceSettingsResponse::new(window, is_default)))
}

/// Store the tenant's own window.
///
/// PUT /api/v1/attendance-settings
pub async fn put_attendance_settings(
    State(state): State<AppState>,
    context: TenantContext,
    Json(request): Json<AttendanceSettingsRequest>,
) -> Result<Json<AttendanceSettingsResponse>, ApiError> {
    request.validate()?;
    let window = request.to_window()?;

    let repo = AttendanceRepository::new(state.pool.clone());
    let stored = repo.upsert_settings(context.tenant_id, &window).await?;

    info!(
        tenant_id = %context.tenant_id,
        start = %window.start,
        end = %window.end,
        late_cutoff = %window.late_cutoff,
        "Attendance window updated"
    );

    Ok(Json(AttendanceSettingsResponse::new(stored.into(), false)))
}
