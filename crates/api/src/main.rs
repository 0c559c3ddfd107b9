use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use geo_attendance_api::app::{create_app, AppState};
use geo_attendance_api::config::Config;
use geo_attendance_api::jobs::{CleanupLocationsJob, JobScheduler, SweepRateLimitsJob};
use geo_attendance_api::middleware::{init_metrics, logging::init_logging};
use persistence::repositories::LocationRepository;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::load().context("loading configuration")?;
    init_logging(&config.logging).context("installing tracing subscriber")?;
    init_metrics().context("installing Prometheus recorder")?;

    info!("Starting geo-attendance API v{}", env!("CARGO_PKG_VERSION"));

    let db_config: persistence::db::DatabaseConfig = (&config.database).into();
    let pool = persistence::db::create_pool(&db_config)
        .await
        .context("connecting to database")?;

    if config.database.run_migrations {
        info!("Running database migrations...");
        persistence::db::run_migrations(&pool).await?;
        info!("Migrations completed");
    }

    let addr = config.socket_addr().context("parsing listen address")?;
    let state = AppState::new(config.clone(), pool.clone())?;

    let mut scheduler = JobScheduler::new();
    scheduler.register(CleanupLocationsJob::new(
        LocationRepository::new(pool.clone()),
        config.limits.location_retention_days,
        config.limits.cleanup_batch_size,
    ));
    if let Some(limiter) = state.rate_limiter.as_ref() {
        scheduler.register(SweepRateLimitsJob::new(Arc::clone(limiter)));
    }
    scheduler.start();

    let app = create_app(state);

    info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.shutdown();
    scheduler.wait_for_shutdown(Duration::from_secs(30)).await;
    pool.close().await;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
