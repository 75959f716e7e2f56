//! Roadbook Server binary.
//!
//! Boots the record service with either the in-memory backend (default)
//! or PostgreSQL when `DATABASE_URL` is set.

use roadbook_server::clock::{Clock, SystemClock};
use roadbook_server::config::Config;
use roadbook_server::kv::{KvStore, MemoryKv, PostgresKv};
use roadbook_server::{build_router, AppState};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roadbook_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!("Starting Roadbook Server on {}:{}", config.host, config.port);

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let kv: Arc<dyn KvStore> = match &config.database_url {
        Some(url) => {
            tracing::info!("Using PostgreSQL storage backend");
            let store = PostgresKv::connect(url, Arc::clone(&clock)).await?;
            let purged = store.purge_expired().await?;
            if purged > 0 {
                tracing::info!(purged, "Removed expired trash entries on startup");
            }
            Arc::new(store)
        }
        None => {
            tracing::info!("Using in-memory storage backend");
            Arc::new(MemoryKv::new(Arc::clone(&clock)))
        }
    };

    let state = AppState::new(kv, clock, config.clone());
    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
