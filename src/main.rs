use dbcreds::service::{DatabaseBackend, LeaseManager, SecretsBackend};
use dbcreds::storage::{SqliteStorage, Storage};
use mimalloc::MiMalloc;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg = &dbcreds::config::CONFIG;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cfg.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    if cfg.api_key.is_empty() {
        return Err("DBCREDS_API_KEY must be set".into());
    }

    info!(
        listen_addr = %cfg.listen_addr,
        storage_url = %cfg.storage_url,
        loglevel = %cfg.loglevel,
        default_ttl = ?cfg.default_ttl,
        system_max_ttl = ?cfg.system_max_ttl,
    );

    let storage: Arc<dyn Storage> = Arc::new(SqliteStorage::connect(&cfg.storage_url).await?);
    let backend = Arc::new(DatabaseBackend::new(storage.clone(), cfg.ttl_defaults()));
    let leases = Arc::new(LeaseManager::new(storage, backend.clone()));

    let sweeper = leases.clone().spawn_sweeper(cfg.sweep_interval);

    let state = dbcreds::router::CredsState::new(backend.clone(), leases, cfg.api_key.as_str());
    let app = dbcreds::router::creds_router(state);

    let listener = TcpListener::bind(&cfg.listen_addr).await?;
    info!("HTTP server listening on {}", cfg.listen_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for shutdown signal");
            }
        })
        .await?;

    sweeper.abort();
    backend.clean().await;
    info!("shutdown complete");
    Ok(())
}
