//! Tracing subscriber setup

use tracing_subscriber::EnvFilter;

use tamago_core::{TamagoError, TamagoResult};

use crate::LogConfig;

/// Build the log filter: `RUST_LOG` when set, the configured level otherwise
pub fn log_filter(config: &LogConfig) -> TamagoResult<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|e| TamagoError::Config(format!("log level {:?}: {}", config.level, e))),
    }
}

/// Install the global tracing subscriber. Call once, at startup.
pub fn init_tracing(config: &LogConfig) -> TamagoResult<()> {
    let filter = log_filter(config)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.compact().try_init()
    };
    installed.map_err(|e| TamagoError::Config(format!("tracing already initialized: {}", e)))
}
