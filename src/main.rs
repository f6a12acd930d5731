mod api;
mod config;
mod db;
mod error;
mod repository;
mod state;
mod stats;
mod types;

use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::routes::{router, ApiState};
use crate::config::{Config, StorageBackend};
use crate::db::SqliteBetRepository;
use crate::error::Result;
use crate::repository::BetRepository;
use crate::state::InMemoryBetStore;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Storage backend, chosen once ---
    let repo: Arc<dyn BetRepository> = match cfg.storage_backend {
        StorageBackend::Sqlite => {
            let pool = db::connect(&cfg.db_path).await?;
            info!("Database ready at {}", cfg.db_path);
            Arc::new(SqliteBetRepository::new(pool))
        }
        StorageBackend::Memory => {
            warn!("Using in-memory bet store; bets are lost on restart");
            InMemoryBetStore::new()
        }
    };

    // --- HTTP API ---
    let app = router(ApiState::new(repo));

    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(backend = %cfg.storage_backend, "HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;
    Ok(())
}
