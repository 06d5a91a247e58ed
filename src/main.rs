//! # Beamlight Node
//!
//! Entry point of the node process:
//! 1. Set up tracing from the [`NodeConfig`] log settings.
//! 2. Build the [`Node`] and register services.
//! 3. Start, then park until SIGINT/SIGTERM.
//! 4. Stop exactly once. A second signal while draining forces exit, and a failure to
//!    listen for signals stops the node and exits non-zero.

use beamlight::config::NodeConfig;
use beamlight::lifecycle::{serve_until_shutdown, setup_tracing, shutdown_signal, Node};
use std::process::ExitCode;
use tracing::{error, info};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> ExitCode {
    let config = NodeConfig::default();

    if let Err(e) = setup_tracing(&config.log) {
        eprintln!("Error initialising logging: {e}");
        return ExitCode::FAILURE;
    }

    info!(version = VERSION, "Beamlight Ethereum Beam Chain Client");
    info!(data_dir = %config.data_dir.display(), chain = %config.chain, "Loaded configuration");

    let node = Node::new();

    // Concrete services (p2p, consensus, storage, metrics) are registered here once they exist.

    if let Err(e) = node.start() {
        error!(error = %e, "Failed to start node");
        return ExitCode::FAILURE;
    }

    let outcome = serve_until_shutdown(&node, shutdown_signal).await;

    info!(?outcome, "Shutdown complete");
    outcome.into()
}
