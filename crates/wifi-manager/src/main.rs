//! Wifi Manager service entry point.
//!
//! Runs the headless service: the tick driver, the registration queue, expiry
//! purging, and an operator console on stdin.  The router and the code store
//! are the in-memory adapters; the console's `connect`/`disconnect` commands
//! stage what the simulated router sees.
//!
//! # Usage
//!
//! ```text
//! wifi-manager [OPTIONS]
//!
//! Options:
//!   --config <PATH>          Config file [default: platform config dir]
//!   --tick-interval <SECS>   Overrides timing.tick_interval_secs
//!   --log-level <LEVEL>      Overrides manager.log_level
//! ```
//!
//! `RUST_LOG`, when set, takes precedence over both log level settings.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load config, restore bindings from the store
//!  └─ spawn
//!       ├─ purge_expired        (expiry channel → store)
//!       ├─ registration workers (mpsc queue → router lookup → bind)
//!       └─ TickDriver::run      (interval → tick → block / unblock)
//!  └─ Console::run on stdin until `quit` or Ctrl-C
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::io::BufReader;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use wifi_core::CodeManager;
use wifi_manager::application::expiry::{expiry_channel, purge_expired};
use wifi_manager::application::issue_codes::{CodeIssuer, DurationPolicy};
use wifi_manager::application::ports::{CodeStore, Router};
use wifi_manager::application::register_device::RegisterDeviceUseCase;
use wifi_manager::application::restore::restore_bindings;
use wifi_manager::application::run_ticks::TickDriver;
use wifi_manager::infrastructure::console::Console;
use wifi_manager::infrastructure::router::simulated::SimulatedRouter;
use wifi_manager::infrastructure::storage::config::{self, AppConfig};
use wifi_manager::infrastructure::storage::memory::MemoryCodeStore;

/// Capacity of the registration queue.
const REGISTRATION_QUEUE: usize = 64;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Wifi Manager: time-limited guest access codes enforced on a router.
#[derive(Debug, Parser)]
#[command(
    name = "wifi-manager",
    about = "Issues guest wifi codes and blocks devices that never redeemed one",
    version
)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, env = "WIFI_MANAGER_CONFIG")]
    config: Option<PathBuf>,

    /// Seconds between two ticks.
    #[arg(long, env = "WIFI_MANAGER_TICK_INTERVAL")]
    tick_interval: Option<u64>,

    /// Log level when `RUST_LOG` is not set.
    #[arg(long, env = "WIFI_MANAGER_LOG_LEVEL")]
    log_level: Option<String>,
}

impl Cli {
    /// Loads the config file and applies command-line overrides.
    fn into_app_config(self) -> anyhow::Result<AppConfig> {
        let mut cfg = match &self.config {
            Some(path) => config::load_config_from(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => config::load_config().context("failed to load default config")?,
        };
        if let Some(secs) = self.tick_interval {
            cfg.timing.tick_interval_secs = secs;
        }
        if let Some(level) = self.log_level {
            cfg.manager.log_level = level;
        }
        cfg.validate().context("invalid command-line override")?;
        Ok(cfg)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Cli::parse().into_app_config()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&cfg.manager.log_level)),
        )
        .init();

    info!("Wifi Manager starting");

    // ── Shared state ──────────────────────────────────────────────────────────
    let (on_expired, expired_rx) = expiry_channel();
    let manager = Arc::new(CodeManager::with_grace(
        cfg.timing.foreign_grace_ticks,
        Some(on_expired),
    ));
    let store: Arc<dyn CodeStore> = Arc::new(MemoryCodeStore::new());
    let simulated = Arc::new(SimulatedRouter::new());
    let router: Arc<dyn Router> = simulated.clone();

    restore_bindings(&manager, store.as_ref()).context("failed to restore bindings")?;

    // ── Background tasks ──────────────────────────────────────────────────────
    let purge = tokio::spawn(purge_expired(expired_rx, Arc::clone(&store)));

    let (registration_tx, registration_rx) = mpsc::channel(REGISTRATION_QUEUE);
    let workers = Arc::new(RegisterDeviceUseCase::new(
        Arc::clone(&router),
        Arc::clone(&manager),
        Arc::clone(&store),
    ))
    .spawn_workers(registration_rx, cfg.workers.registration_workers);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let driver = TickDriver::new(
        Arc::clone(&router),
        Arc::clone(&manager),
        Arc::clone(&store),
        cfg.timing.unblock_every_ticks,
    );
    let ticks = tokio::spawn(driver.run(cfg.timing.tick_interval(), shutdown_rx));

    // ── Operator console ──────────────────────────────────────────────────────
    let issuer = CodeIssuer::new(
        Arc::clone(&manager),
        Arc::clone(&store),
        DurationPolicy::from(&cfg.codes),
    );
    let console = Console::new(issuer, Arc::clone(&store), simulated, registration_tx);

    info!("Wifi Manager ready.  Type 'help' for commands, Ctrl-C to exit.");

    tokio::select! {
        result = console.run(BufReader::new(tokio::io::stdin()), tokio::io::stdout()) => {
            if let Err(e) = result {
                error!("console failed: {e}");
            }
        }
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => info!("shutdown signal received"),
                Err(e) => error!("failed to listen for Ctrl-C: {e}"),
            }
        }
    }

    // ── Shutdown ──────────────────────────────────────────────────────────────
    let _ = shutdown_tx.send(true);
    if let Err(e) = ticks.await {
        error!("tick driver panicked: {e}");
    }

    // Closing the queue lets the workers drain and exit.
    drop(console);
    if let Err(e) = workers.await {
        error!("registration workers panicked: {e}");
    }

    // The purge task ends once the last manager handle (and its callback) is gone.
    drop(manager);
    match tokio::time::timeout(Duration::from_secs(5), purge).await {
        Ok(Err(e)) => error!("purge task panicked: {e}"),
        Err(_) => warn!("purge task did not finish"),
        Ok(Ok(())) => {}
    }

    info!("Wifi Manager stopped");
    Ok(())
}
