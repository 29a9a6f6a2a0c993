//! Tracing setup for the shelfstore binary and embedding services.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;

/// Builds the filter: `RUST_LOG` when set, the configured level for the shelfstore
/// crates otherwise.
pub fn env_filter(logging: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,shelfstore={level},shelfstore_core={level},shelfstore_memory={level},shelfstore_sqlite={level}",
            level = logging.level
        ))
    })
}

/// Installs the global subscriber. Fails when one is already installed.
pub fn init_tracing(logging: &LoggingConfig) -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(env_filter(logging))
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    Ok(())
}
