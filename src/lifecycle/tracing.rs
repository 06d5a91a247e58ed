//! # Observability & Tracing
//!
//! [`setup_tracing`] initialises structured logging for the whole node process.
//!
//! ## Configuration
//!
//! - `RUST_LOG`, when set, wins. Otherwise [`LogConfig::level`] is used as the filter.
//! - [`LogFormat::Text`] gives the compact format without module paths (`with_target(false)`);
//!   the `service` field already says where a line came from.
//! - [`LogFormat::Json`] emits one JSON object per line for log shippers.
//! - [`LogConfig::file`] appends to a file instead of stderr.
//!
//! ## What Gets Traced
//!
//! - **Node lifecycle**: start (with service count), stop, drain completion or timeout
//! - **Per service**: start, stop, exit, and every failure keyed by `service`
//!
//! ```text
//! INFO Starting node count=2
//! INFO Starting service service=network
//! INFO Starting service service=consensus
//! INFO Stopping node count=2
//! INFO Stopping service service=consensus
//! ERROR Error stopping service service=consensus error=flush failed
//! INFO Stopping service service=network
//! INFO All services stopped
//! ```
//!
//! ```bash
//! RUST_LOG=debug cargo run                 # registration and exits too
//! RUST_LOG=beamlight::lifecycle=trace cargo run
//! ```

use crate::config::{LogConfig, LogFormat};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. Fails if the log file cannot be opened or a subscriber
/// is already installed.
pub fn setup_tracing(config: &LogConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    match (config.file(), config.format) {
        (None, LogFormat::Text) => builder.compact().try_init(),
        (None, LogFormat::Json) => builder.json().try_init(),
        (Some(path), format) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let builder = builder.with_ansi(false).with_writer(Mutex::new(file));
            match format {
                LogFormat::Text => builder.compact().try_init(),
                LogFormat::Json => builder.json().try_init(),
            }
        }
    }
}
