use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use domain::services::{AutoAttendanceEngine, CachedFenceRepository, FenceRepository};
use persistence::repositories::{
    AttendanceRepository, ContainmentRepository, GeofenceRepository, LocationRepository,
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{Config, ConfigValidationError};
use crate::middleware::{
    metrics_handler, metrics_middleware, rate_limit_middleware, trace_id, RateLimiterState,
};
use crate::routes::{attendance_settings, geofence_events, geofences, health, locations};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub engine: Arc<AutoAttendanceEngine>,
    /// Shared with the engine; routes invalidate it when fences change.
    pub fence_cache: Arc<CachedFenceRepository>,
    pub rate_limiter: Option<Arc<RateLimiterState>>,
}

impl AppState {
    /// Wires the PostgreSQL repositories into the attendance engine.
    pub fn new(config: Config, pool: PgPool) -> Result<Self, ConfigValidationError> {
        let inside_policy = config.inside_event_policy()?;
        let default_window = config.default_window()?;

        let fence_cache = Arc::new(CachedFenceRepository::new(
            Arc::new(GeofenceRepository::new(pool.clone())),
            config.fence_cache_ttl(),
        ));
        let fences: Arc<dyn FenceRepository> = fence_cache.clone();
        let engine = AutoAttendanceEngine::new(
            fences,
            Arc::new(LocationRepository::new(pool.clone())),
            Arc::new(ContainmentRepository::new(pool.clone())),
            Arc::new(AttendanceRepository::new(pool.clone())),
        )
        .with_inside_policy(inside_policy)
        .with_default_window(default_window);

        let rate_limiter = RateLimiterState::new(
            config.security.rate_limit_samples,
            Duration::from_secs(config.security.rate_limit_window_secs),
        )
        .map(Arc::new);

        Ok(Self {
            pool,
            config: Arc::new(config),
            engine: Arc::new(engine),
            fence_cache,
            rate_limiter,
        })
    }
}

pub fn create_app(state: AppState) -> Router {
    let config = state.config.clone();

    let cors = if config.security.cors_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = config
            .security
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    // Student-facing ingestion, limited per student
    let ingest_routes = Router::new()
        .route("/api/v1/locations", post(locations::submit_location))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ));

    // Tenant administration
    let admin_routes = Router::new()
        .route(
            "/api/v1/geofences",
            post(geofences::create_geofence).get(geofences::list_geofences),
        )
        .route(
            "/api/v1/geofences/:geofence_id",
            get(geofences::get_geofence)
                .patch(geofences::update_geofence)
                .delete(geofences::delete_geofence),
        )
        .route(
            "/api/v1/geofence-events",
            get(geofence_events::list_geofence_events),
        )
        .route(
            "/api/v1/attendance-settings",
            get(attendance_settings::get_attendance_settings)
                .put(attendance_settings::put_attendance_settings),
        );

    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/ready", get(health::ready))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(metrics_handler));

    Router::new()
        .merge(public_routes)
        .merge(ingest_routes)
        .merge(admin_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(RequestBodyLimitLayer::new(config.server.max_body_size))
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors)
        .with_state(state)
}
