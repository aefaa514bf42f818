//! roverlinkd - rover side of the teleoperation channel
//!
//! Serves one websocket endpoint. Consoles connect with
//! `ws://<host>:<port>/?route_id=<route>&user=<user>`, send JSON control
//! messages in text frames and receive video in binary frames.
//!
//! Runs with a simulated drive and a synthetic video source until real
//! hardware adapters are wired in.

use anyhow::{Context, Result};
use std::env;
use tracing::info;
use tracing_subscriber::EnvFilter;

use roverlink::{LinkConfig, RoverLink};

/// Parse the config path from command line arguments.
///
/// Supports:
/// - `roverlinkd <path>` (positional)
/// - `roverlinkd --config <path>` / `-c <path>`
///
/// Without one, built-in defaults are used.
fn parse_config_path() -> Option<String> {
    let args: Vec<String> = env::args().collect();

    for i in 1..args.len() {
        if (args[i] == "--config" || args[i] == "-c") && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
    }

    args.get(1).filter(|arg| !arg.starts_with('-')).cloned()
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = match parse_config_path() {
        Some(path) => LinkConfig::load(&path).with_context(|| format!("loading config {path}"))?,
        None => LinkConfig::default(),
    };

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("roverlinkd v{} starting", env!("CARGO_PKG_VERSION"));
    info!(
        rover = %config.server.rover_id,
        policy = ?config.server.session_policy,
        max_speed = config.drive.max_speed.kmh(),
        "Configuration loaded"
    );

    let rover = RoverLink::builder(config).start().await.context("starting rover link")?;
    info!("Consoles connect at {}", rover.url());

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    info!("Shutting down");
    rover.shutdown().await;
    Ok(())
}
