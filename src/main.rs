use anyhow::{Context, Result};
use clap::Parser;
use dotenvy::dotenv;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod config;
mod errors;
mod models;
mod routes;
mod stats;
mod store;

use config::{Config, StorageBackend};
use store::{MemoryStore, PgStore, SharedStore};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::parse();

    let store: SharedStore = match config.storage {
        StorageBackend::Postgres => {
            let store = PgStore::connect(&config.database_url, config.max_connections)
                .await
                .context("failed to connect to the database")?;
            if config.run_migrations {
                store.migrate().await.context("failed to apply migrations")?;
                tracing::info!("🗄️ Database schema up to date");
            }
            Arc::new(store)
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; data will not survive a restart");
            Arc::new(MemoryStore::new())
        }
    };

    let app = routes::app(store);

    tracing::info!("🧠 Server running at {}", config.bind_addr);
    axum::serve(
        tokio::net::TcpListener::bind(config.bind_addr).await?,
        app.into_make_service(),
    )
    .await?;

    Ok(())
}
