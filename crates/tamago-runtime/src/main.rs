//! tamagod - pet controller daemon
//!
//! Runs the controller against an in-memory store, optionally seeded from a
//! JSON file, and reads operator commands from stdin until Ctrl-C or `quit`.
//!
//! ```bash
//! tamagod --pets pets.json --workers 4 --log-level debug
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};

use tamago_core::{Clock, SystemClock};
use tamago_reconcile::{FanoutEmitter, MemoryEmitter, Reconciler, TracingEmitter};
use tamago_runtime::{
    init_tracing, seed_from_file, spawn_line_reader, Console, Controller, ControllerConfig,
};
use tamago_store::MemoryStore;

#[derive(Parser)]
#[command(name = "tamagod")]
#[command(version)]
#[command(about = "Pet vitality controller")]
struct Cli {
    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON array of pets to create at startup
    #[arg(long)]
    pets: Option<PathBuf>,

    /// Reconciliation workers (overrides the config file)
    #[arg(long)]
    workers: Option<usize>,

    /// Log filter directive (overrides the config file)
    #[arg(long)]
    log_level: Option<String>,

    /// Emit JSON log lines
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ControllerConfig::load(path)?,
        None => ControllerConfig::default(),
    };
    if let Some(workers) = cli.workers {
        config.workers = workers;
    }
    if let Some(level) = cli.log_level {
        config.log.level = level;
    }
    config.log.json |= cli.json_logs;
    config.validate()?;

    init_tracing(&config.log)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        workers = config.workers,
        "tamagod starting"
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = Arc::new(MemoryStore::unsynced(Arc::clone(&clock)));
    if let Some(path) = &cli.pets {
        seed_from_file(&*store, path)
            .await
            .with_context(|| format!("failed to seed pets from {}", path.display()))?;
    }
    store.mark_synced();

    let events = Arc::new(MemoryEmitter::new());
    let emitter = FanoutEmitter::new()
        .with(Arc::new(TracingEmitter))
        .with(events.clone());
    let reconciler = Reconciler::with_config(
        Arc::clone(&store),
        Arc::new(emitter),
        clock,
        config.reconciler.clone(),
    );
    let controller = Controller::new(reconciler, config.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let console = Console::new(
        Arc::clone(&store),
        events,
        config.reconciler.write_retry.clone(),
    );
    let lines = spawn_line_reader(std::io::BufReader::new(std::io::stdin()))
        .context("failed to start console reader")?;
    let console_shutdown = shutdown_tx.clone();
    tokio::spawn(async move {
        match console.run(lines, tokio::io::stdout()).await {
            Ok(true) => {
                let _ = console_shutdown.send(true);
            }
            Ok(false) => info!("stdin closed, console stopped"),
            Err(e) => error!(error = %e, "console failed"),
        }
    });

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("interrupt received");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => error!(error = %e, "failed to listen for ctrl-c"),
        }
    });

    controller.run(shutdown_rx).await?;
    info!("tamagod stopped");
    Ok(())
}
