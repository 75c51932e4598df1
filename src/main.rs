//! Vest Relay - detection relay between the vision frontend and the vest's ESP32
//!
//! Serves the HTTP API and runs the auto-reset watchdog until Ctrl+C.

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;

use crate::cli::Args;
use vest_relay::api::{self, ApiState};
use vest_relay::{AppConfig, StateStore, Watchdog};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    init_logging(&args.log_level)?;

    info!("Starting Vest Relay...");
    info!("Configuration file: {}", args.config.display());

    let mut config = AppConfig::load_or_default(&args.config).await?;
    args.apply_overrides(&mut config);
    config.validate()?;
    let addr = config.socket_addr()?;

    let store = Arc::new(StateStore::new());

    let watchdog = if config.watchdog.enabled {
        Some(Watchdog::new(store.clone(), &config.watchdog).spawn())
    } else {
        info!("Auto-reset watchdog disabled");
        None
    };

    let state = Arc::new(ApiState {
        store,
        auto_reset_enabled: config.watchdog.enabled,
        auto_reset_seconds: config.watchdog.auto_reset_seconds,
    });

    info!("Endpoints:");
    info!("  GET  /api/position   (ESP32 polls this)");
    info!("  POST /api/detection  (frontend sends here)");
    info!("  GET  /api/status     (system status)");
    info!("  POST /api/manual     (manual testing)");
    if config.watchdog.enabled {
        info!(
            "Auto-reset enabled: motors stop after {:.1}s of no updates",
            config.watchdog.auto_reset_seconds
        );
    }

    let served = api::start_server(state, addr, shutdown_signal()).await;

    if let Some(watchdog) = watchdog {
        watchdog.shutdown().await;
    }

    served?;
    info!("Vest Relay shutdown complete");
    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            // Without a signal handler, run until the process is killed
            error!("Failed to install CTRL+C signal handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
