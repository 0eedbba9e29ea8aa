//! # Beacon hub
//!
//! Realtime presence, chat, and live-session signaling server.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default settings
//! beacon
//!
//! # Run with a config file at ./beacon.toml
//! beacon
//!
//! # Run with environment variables
//! BEACON_PORT=8080 BEACON_HOST=0.0.0.0 BEACON_TOKEN_SECRET=... beacon
//! ```

mod auth;
mod chat;
mod config;
mod dispatch;
mod group;
mod heartbeat;
mod live;
mod metrics;
mod state;
#[cfg(test)]
mod testutil;
mod ws;

use anyhow::Result;
use beacon_store::{LogNotifier, MemoryStore};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "beacon=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::load()?;

    tracing::info!("Starting Beacon hub on {}:{}", config.host, config.port);

    // Initialize metrics
    metrics::init_metrics();

    // The reference store and notifier; a deployment swaps these for its
    // database-backed implementations.
    let store = Arc::new(MemoryStore::new());
    let notifier = Arc::new(LogNotifier);

    // Start the server
    ws::run_server(config, store, notifier).await?;

    Ok(())
}
