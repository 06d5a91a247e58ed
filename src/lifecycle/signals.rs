//! OS signal handling for the hosting process.
//!
//! The node itself never listens for signals. [`serve_until_shutdown`] awaits a signal once
//! to trigger [`Node::stop`], and a second time to force exit if the drain hangs.

use crate::lifecycle::Node;
use std::future::Future;
use std::io;
use std::process::ExitCode;
use tracing::{error, info, warn};

/// Which signal ended the wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    Interrupt,
    Terminate,
}

/// Completes on the next SIGINT (Ctrl-C) or, on Unix, SIGTERM.
#[cfg(unix)]
pub async fn shutdown_signal() -> io::Result<ShutdownSignal> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    let received = tokio::select! {
        res = tokio::signal::ctrl_c() => res.map(|_| ShutdownSignal::Interrupt)?,
        _ = terminate.recv() => ShutdownSignal::Terminate,
    };
    info!(signal = ?received, "Received shutdown signal");
    Ok(received)
}

/// Completes on the next Ctrl-C.
#[cfg(not(unix))]
pub async fn shutdown_signal() -> io::Result<ShutdownSignal> {
    tokio::signal::ctrl_c().await?;
    info!(signal = ?ShutdownSignal::Interrupt, "Received shutdown signal");
    Ok(ShutdownSignal::Interrupt)
}

/// How [`serve_until_shutdown`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// A signal arrived and the node stopped.
    Graceful,
    /// No signal listener could be installed. The node was stopped anyway.
    SignalUnavailable,
    /// A second signal arrived before the drain finished.
    Forced,
}

impl From<ShutdownOutcome> for ExitCode {
    fn from(outcome: ShutdownOutcome) -> Self {
        match outcome {
            ShutdownOutcome::Graceful => ExitCode::SUCCESS,
            ShutdownOutcome::SignalUnavailable | ShutdownOutcome::Forced => ExitCode::FAILURE,
        }
    }
}

/// Parks a started node until `signal` fires, then stops it once.
///
/// `signal` is called again while draining; a second signal abandons the drain.
pub async fn serve_until_shutdown<S, F>(node: &Node, mut signal: S) -> ShutdownOutcome
where
    S: FnMut() -> F,
    F: Future<Output = io::Result<ShutdownSignal>>,
{
    let outcome = match signal().await {
        Ok(_) => {
            info!("Gracefully shutting down");
            ShutdownOutcome::Graceful
        }
        Err(e) => {
            error!(error = %e, "Cannot listen for shutdown signals, stopping node");
            ShutdownOutcome::SignalUnavailable
        }
    };

    tokio::select! {
        res = node.stop() => {
            if let Err(e) = res {
                error!(error = %e, "Error during shutdown");
            }
        }
        Ok(_) = signal() => {
            warn!(pending = ?node.in_flight_services(), "Second signal received, forcing exit");
            return ShutdownOutcome::Forced;
        }
    }

    for failure in node.failures() {
        warn!(service = %failure.service, phase = ?failure.phase, error = %failure.message, "Service reported a failure");
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::mock::{EventLog, MockService};
    use crate::lifecycle::NodeState;
    use std::future::{pending, ready};

    #[tokio::test]
    async fn signal_listener_failure_stops_node_and_fails() {
        let log = EventLog::new();
        let node = Node::new();
        let svc = MockService::new("net", &log);
        node.register(svc.clone());
        node.start().expect("start");

        let outcome = serve_until_shutdown(&node, || {
            ready(Err(io::Error::other("no signal driver")))
        })
        .await;

        assert_eq!(outcome, ShutdownOutcome::SignalUnavailable);
        assert_eq!(node.state(), NodeState::Stopped);
        assert_eq!(svc.stop_calls(), 1);
    }

    #[tokio::test]
    async fn first_signal_stops_node_cleanly() {
        let log = EventLog::new();
        let node = Node::new();
        node.register(MockService::new("net", &log));
        node.start().expect("start");

        let mut calls = 0;
        let outcome = serve_until_shutdown(&node, || {
            calls += 1;
            let first = calls == 1;
            async move {
                if first {
                    Ok(ShutdownSignal::Interrupt)
                } else {
                    pending().await
                }
            }
        })
        .await;

        assert_eq!(outcome, ShutdownOutcome::Graceful);
        assert_eq!(node.state(), NodeState::Stopped);
        assert_eq!(log.stops(), vec!["net"]);
    }
}
