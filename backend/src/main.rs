mod config;
mod error;
mod handlers;
mod pollers;
mod routes;
mod store;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::AppConfig;
use crate::pollers::{start_room_polling_task, HttpFeedSource, RoomPoller};
use crate::routes::create_app;
use crate::store::RoomStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "conffree_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = AppConfig::load()?;

    let store = RoomStore::new(&config.rooms);
    tracing::info!(
        "Starting conffree API ({} rooms, timezone {})",
        store.room_count(),
        config.timezone
    );

    // Start room polling background task
    let source =
        HttpFeedSource::new(&config.feed).context("Failed to build HTTP client for feeds")?;
    let poller = RoomPoller::new(
        Arc::new(source),
        store.clone(),
        config.rooms.clone(),
        config.timezone,
    );
    let poll_handle = tokio::spawn(start_room_polling_task(poller, config.poll_interval()));

    // Run server
    let app = create_app(store);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Graceful shutdown
    poll_handle.abort();
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received, stopping..."),
        Err(e) => {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
