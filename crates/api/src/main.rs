use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use domain::services::{InMemoryZoneStore, ZoneStore};
use persistence::PgZoneStore;
use riskzone_api::app::{create_app, AppState};
use riskzone_api::config::{Config, StorageBackend};
use riskzone_api::jobs::{AutoPredictJob, ExpirePredictionsJob, JobScheduler, RefreshSnapshotJob};
use riskzone_api::middleware::{init_metrics, logging::init_logging};
use riskzone_api::services::HttpPredictionClient;

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
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

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = Config::load().context("failed to load configuration")?;

    init_logging(&config.logging)?;
    init_metrics()?;

    info!("Starting risk zone API v{}", env!("CARGO_PKG_VERSION"));

    let mut scheduler = JobScheduler::new();

    let store: Arc<dyn ZoneStore> = match config.storage.backend {
        StorageBackend::Postgres => {
            let db_config: persistence::db::DatabaseConfig = (&config.database).into();
            info!(database = %db_config.redacted_url(), "Connecting to zone database");
            let pool = persistence::db::create_pool(&db_config)
                .await
                .context("failed to connect to database")?;

            info!("Running database migrations...");
            let migrations = persistence::db::run_migrations(&pool).await?;
            info!(migrations, "Migrations completed");

            let store = Arc::new(PgZoneStore::connect(pool).await?);
            scheduler.register(RefreshSnapshotJob::new(
                store.clone(),
                config.storage.snapshot_refresh_secs,
            ));
            store as Arc<dyn ZoneStore>
        }
        StorageBackend::Memory => {
            info!("Using in-memory zone store; zones are lost on restart");
            Arc::new(InMemoryZoneStore::new()) as Arc<dyn ZoneStore>
        }
    };

    let predictor = Arc::new(HttpPredictionClient::new(&config.prediction_service)?);
    info!(prediction_service = %predictor.base_url(), "Prediction service configured");

    let addr = config.socket_addr()?;
    let expiry_sweep_secs = config.storage.expiry_sweep_secs;
    let state = AppState::new(config, store, predictor);

    scheduler.register(AutoPredictJob::new(state.clone()));
    scheduler.register(ExpirePredictionsJob::new(
        state.engine.clone(),
        expiry_sweep_secs,
    ));
    scheduler.start();

    let app = create_app(state);

    info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.shutdown();
    scheduler.wait_for_shutdown(Duration::from_secs(30)).await;

    Ok(())
}
