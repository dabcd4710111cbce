mod cli;

use crate::cli::Cli;
use anyhow::Context;
use burrow_gateway::{App, AppState, JwtKeys};
use burrow_generator::RandomGenerator;
use burrow_shortener::{Shortener, ShortenerService};
use burrow_storage::open_repository;
use clap::Parser;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Cli::parse();
    burrow_telemetry::init(config.log_format)?;

    let storage = config.storage_config();
    info!(
        listen_addr = %config.listen_addr,
        base_url = %config.base_url,
        storage_backend = %storage.backend(),
        "starting gateway server"
    );

    let repository = open_repository(&storage)
        .await
        .context("failed to open storage backend")?;
    let shortener: Arc<dyn Shortener> = Arc::new(ShortenerService::from_shared(
        Arc::clone(&repository),
        RandomGenerator::new(),
    ));
    let state = AppState::new(
        Arc::clone(&shortener),
        config.base_url.as_str(),
        JwtKeys::new(&config.jwt_config()),
    );

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    info!(listen_addr = %listener.local_addr()?, "listening");

    let served = axum::serve(listener, App::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await;

    // accepted deletes must reach storage before it closes
    shortener.drain_deletes().await;
    if let Err(err) = repository.close().await {
        error!(error = %err, "failed to close storage backend");
    }

    served.context("gateway server failed")
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
