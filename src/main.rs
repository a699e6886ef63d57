use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use axbridge::bridge::service;
use axbridge::config as cfg;
use axbridge::session::Session;
use axbridge::sources;

/// axbridge CLI: a headless host for the accessibility bridge.
#[derive(Debug, Parser)]
#[command(
    name = axbridge::PKG_NAME,
    version = axbridge::PKG_VERSION,
    about = "Headless host for the accessibility automation bridge"
)]
struct Args {
    /// Path to the JSON configuration file
    #[arg(short = 'c', long = "config", default_value = "config/bridge.json")]
    config: PathBuf,

    /// Replay gestures on the desktop pointer instead of the simulated host
    #[arg(long = "desktop")]
    desktop: bool,

    /// With --desktop: log gestures instead of moving the pointer
    #[arg(long = "dry-run")]
    dry_run: bool,

    /// Override the platform API level reported by the host
    #[arg(long = "api-level")]
    api_level: Option<u32>,

    /// Set log level (e.g., trace, debug, info, warn, error). Overrides RUST_LOG.
    #[arg(long = "log-level")]
    log_level: Option<String>,

    /// Print the JSON Schema for the configuration and exit
    #[arg(long = "print-schema")]
    print_schema: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    match args.log_level.as_deref() {
        Some(level) => {
            axbridge::init_tracing_with(axbridge::parse_level(level).unwrap_or(tracing::Level::INFO));
        }
        None => axbridge::init_tracing(),
    }

    if args.print_schema {
        let schema = cfg::generate_schema();
        let json = serde_json::to_string_pretty(&schema)?;
        println!("{json}");
        return Ok(());
    }

    info!(
        version = axbridge::PKG_VERSION,
        config = %args.config.display(),
        desktop = args.desktop,
        "Starting axbridge"
    );

    let mut config = cfg::load_from_path_async(&args.config).await?;
    if let Some(level) = args.api_level {
        config.host.api_level = level;
    }
    debug!(target: "axbridge", "Configuration loaded successfully");

    let mut session = if args.desktop {
        Session::desktop(&config, args.dry_run)?
    } else {
        Session::simulated(&config)
    };
    service::install(session.service()).context("Failed to install bridge service")?;

    let sources = sources::build_sources_from_config(&config);
    if sources.is_empty() {
        warn!("No message sources configured. The host will wait for Ctrl+C and then exit.");
    }

    let cancel = CancellationToken::new();
    let (tx, mut rx) = mpsc::channel::<Value>(256);
    let handles = sources::spawn_all_sources(&sources, tx, &cancel);

    // Messages are applied one at a time, in arrival order.
    tokio::select! {
        () = async {
            while let Some(message) = rx.recv().await {
                match session.run_message(&message).await {
                    Ok(Some(out)) => println!("{out}"),
                    Ok(None) => {}
                    Err(err) => {
                        error!(error = %err, message = %message, "Failed to handle host message");
                    }
                }
            }
        } => {
            info!("All message sources finished");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    cancel.cancel();
    for handle in handles {
        let _ = handle.await;
    }
    if let Some(bridge) = service::uninstall() {
        bridge.on_disconnect();
    }

    info!("axbridge exited");
    Ok(())
}
