//! Audio Player (primuse-ap) - Main entry point
//!
//! Owns the single playback session for a PriMuse installation and exposes
//! it to the mini player, the full player and any other client over a local
//! HTTP + SSE API.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use primuse_ap::api::{self, AppContext};
use primuse_ap::backend::{list_devices, DeviceBackend};
use primuse_ap::config::{Args, Config};
use primuse_ap::PlaybackCoordinator;
use primuse_common::JsonTrackResolver;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load(&args).context("Failed to load configuration")?;

    // RUST_LOG wins over the configured level
    let default_filter = format!(
        "primuse_ap={level},primuse_common={level},tower_http={level}",
        level = config.log_level
    );
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if args.list_devices {
        for device in list_devices().context("Failed to enumerate output devices")? {
            println!("{}", device);
        }
        return Ok(());
    }

    info!("Starting PriMuse Audio Player on port {}", config.port);
    match &config.source {
        Some(path) => info!("Config file: {}", path.display()),
        None => info!("No config file found, using defaults"),
    }
    info!(
        "Output device: {}",
        config.device.as_deref().unwrap_or("system default")
    );

    let backend = Arc::new(DeviceBackend::new(config.device.clone(), config.fetch_limits()));
    let coordinator = PlaybackCoordinator::new(backend, config.coordinator_settings());
    let ctx = AppContext::new(coordinator.clone(), Arc::new(JsonTrackResolver));

    let served = api::run(ctx, config.port, shutdown_signal()).await;

    // Stop audio before exit whether or not the server failed
    coordinator.release().await;
    served.context("HTTP server failed")?;

    info!("Shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
