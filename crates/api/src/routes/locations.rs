//! Location submission handler.

use axum::{extract::State, Json};
use chrono::Utc;
use domain::models::location::SubmitLocationRequest;
use domain::services::PipelineReport;
use tracing::info;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::StudentContext;

/// Accept one location sample and run it through the attendance pipeline.
///
/// POST /api/v1/locations
///
/// Responds with the per-fence evaluation, the events emitted and the
/// attendance rows written. Resubmitting the same sample after a 409 or 503 is
/// safe: the sample is stale against the state it already produced, and any
/// entry left unmarked by the failed attempt is marked now.
pub async fn submit_location(
    State(state): State<AppState>,
    context: StudentContext,
    Json(request): Json<SubmitLocationRequest>,
) -> Result<Json<PipelineReport>, ApiError> {
    request.validate()?;

    let sample = request.into_sample(
        context.tenant_id,
        context.student_id,
        Utc::now(),
        state.config.max_clock_skew(),
    )?;
    let report = state.engine.process_sample(&sample).await?;

    info!(
        tenant_id = %context.tenant_id,
        student_id = %context.student_id,
        fences = report.evaluations.len(),
        events = report.events.len(),
        attendance = report.attendance.len(),
        "Location sample processed"
    );

    Ok(Json(report))
}
