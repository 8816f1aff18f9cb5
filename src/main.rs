//! Treelock lock service
//!
//! Serves the editor-lock HTTP surface over a SQLite lease table.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use treelock::config::Config;
use treelock::db::{self, LeaseRepository};
use treelock::{create_router, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env();

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    if config.log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Starting treelock lock service");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Bind address: {}", config.bind_addr);
    tracing::info!("Lease TTL: {}s", config.lease_ttl.as_secs());

    if config.api_psk.is_none() {
        tracing::warn!("No API PSK configured (TREELOCK_API_PSK). Authentication is disabled!");
    }

    let pool = db::init_database(&config.db_path).await?;
    let leases = Arc::new(LeaseRepository::new(pool, config.lease_ttl));

    let sweeper = db::spawn_expiry_sweeper(leases.clone(), config.sweep_interval);

    let state = AppState {
        leases,
        config: Arc::new(config.clone()),
    };

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    sweeper.abort();
    Ok(())
}
