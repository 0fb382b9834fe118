//! condmap daemon
//!
//! Grabs the configured keyboards and rewrites their key events through the
//! conditional remapping engine.

mod device;
mod device_manager;
mod injector;
mod remapper;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use condmap_config::LogLevel;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use crate::device_manager::DeviceManager;
use crate::injector::create_shared_virtual_device;

const VIRTUAL_DEVICE_NAME: &str = "condmap virtual keyboard";

#[derive(Parser, Debug)]
#[command(name = "condmapd")]
#[command(about = "Conditional keyboard remapping daemon")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "~/.config/condmap/config.kdl")]
    config: String,

    /// Grab devices immediately instead of waiting `startup-delay-ms`
    #[arg(long)]
    no_delay: bool,
}

fn init_tracing(level: LogLevel) {
    // RUST_LOG wins over the configured level
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(level.as_filter_str())),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Expand tilde in config path
    let config_path: PathBuf = shellexpand::tilde(&args.config).into_owned().into();

    let config = condmap_config::parse_config(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;

    init_tracing(config.global.log_level);

    tracing::info!(
        "Loaded configuration from {} with {} device(s)",
        config_path.display(),
        config.devices.len()
    );

    if !nix::unistd::Uid::effective().is_root() {
        tracing::warn!(
            "Not running as root; grabbing devices and creating the virtual keyboard \
             need access to /dev/input and /dev/uinput"
        );
    }

    let mut manager = DeviceManager::new(Arc::new(config))?;

    let delay = manager.config().global.startup_delay_ms;
    if !args.no_delay && delay > 0 {
        tracing::info!("Waiting {} ms before grabbing devices", delay);
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    let virtual_device = create_shared_virtual_device(VIRTUAL_DEVICE_NAME, manager.output_keys())?;

    manager.grab_configured_devices()?;
    if manager.grabbed_count() == 0 {
        let present: Vec<String> = device::enumerate_devices()?
            .into_iter()
            .map(|info| format!("'{}'", info.name))
            .collect();
        bail!(
            "None of the configured devices were found (present: {})",
            present.join(", ")
        );
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks = Vec::new();
    for remapper in manager.into_remappers()? {
        tracing::debug!("Spawning task for {}", remapper.info().path.display());
        tasks.push(tokio::spawn(
            remapper.run(Arc::clone(&virtual_device), shutdown_rx.clone()),
        ));
    }
    drop(shutdown_rx);

    tracing::info!("condmap daemon running with {} device(s)", tasks.len());

    wait_for_shutdown().await?;
    tracing::info!("Shutting down...");

    signal_shutdown(&shutdown_tx);

    for result in futures::future::join_all(tasks).await {
        match result {
            Ok((name, stats)) => tracing::info!("'{}': {}", name, stats),
            Err(e) => tracing::error!("Device task failed: {}", e),
        }
    }

    Ok(())
}

/// Tell every device task to stop
fn signal_shutdown(shutdown_tx: &watch::Sender<bool>) {
    if let Err(e) = shutdown_tx.send(true) {
        tracing::debug!("All device tasks already stopped: {}", e);
    }
}

async fn wait_for_shutdown() -> Result<()> {
    let mut sigterm = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => result.context("Failed to listen for Ctrl-C")?,
        _ = sigterm.recv() => tracing::debug!("Received SIGTERM"),
    }

    Ok(())
}
