//! `portmux` server binary.
//!
//! Run with: `cargo run -p portmux -- --bind 127.0.0.1:3000`

use anyhow::Context;
use clap::Parser;
use portmux::ServerBuilder;
use portmux::cli::Cli;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.to_config();
    tracing::info!("Starting portmux on {}", config.bind_addr);

    let (mut server, handle) = ServerBuilder::new().config(config).build();

    let handle = Arc::new(handle);
    let shutdown_handle = Arc::clone(&handle);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl+C received, shutting down");
            shutdown_handle.shutdown();
        }
    });

    server.run().await.context("server failed")?;

    tracing::info!("Server stopped");
    Ok(())
}
