//! # Service Contract
//!
//! This module defines the capability surface every subsystem must expose to be managed
//! by a [`Node`](crate::lifecycle::Node).
//!
//! ## Key Types
//!
//! - [`Service`]: The trait that networking, consensus, metrics, etc. implement.
//! - [`ExecutionContext`]: The cancellation-aware handle passed to [`Service::start`].
//! - [`CancellationSignal`]: The node-wide, one-shot "stop requested" broadcast.
//! - [`ServiceError`]: The error type services report back.

use async_trait::async_trait;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

// =============================================================================
// 1. THE ABSTRACTION
// =============================================================================

/// Trait that any subsystem must implement to be managed by a [`Node`](crate::lifecycle::Node).
///
/// # Architecture Note
/// The node never constructs a service and never reaches into its state. It only calls
/// these three methods, which keeps concrete subsystems fully decoupled from orchestration.
///
/// # Concurrency
/// - [`start`](Service::start) runs on its own Tokio task and is expected to keep running
///   until `ctx` is cancelled. It must return promptly once cancellation fires.
/// - [`stop`](Service::stop) is called from the node's control task, possibly while
///   `start` is still in flight (or before it has even been polled). Implementations
///   must tolerate both orders.
#[async_trait]
pub trait Service: Send + Sync + 'static {
    /// Human-readable name, used for diagnostics only. Not required to be unique.
    fn name(&self) -> &str;

    /// Runs the service until `ctx` is cancelled or the service decides to return.
    ///
    /// An error is logged against this service's name. It does not affect other services.
    async fn start(&self, ctx: ExecutionContext) -> Result<(), ServiceError>;

    /// Requests cooperative shutdown, in addition to the cancellation of `ctx`.
    async fn stop(&self) -> Result<(), ServiceError>;
}

// =============================================================================
// 2. ERRORS
// =============================================================================

/// Errors a service may report from `start` or `stop`.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    Failed(String),
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl From<String> for ServiceError {
    fn from(msg: String) -> Self {
        ServiceError::Failed(msg)
    }
}

impl From<&str> for ServiceError {
    fn from(msg: &str) -> Self {
        ServiceError::Failed(msg.to_string())
    }
}

// =============================================================================
// 3. CANCELLATION
// =============================================================================

/// The node-wide shutdown broadcast.
///
/// Exactly one exists per node. Firing is idempotent and irreversible: once fired, every
/// [`ExecutionContext`] derived from it observes cancellation, including contexts derived
/// afterwards.
#[derive(Debug, Clone, Default)]
pub struct CancellationSignal {
    token: CancellationToken,
    fired: Arc<AtomicBool>,
}

impl CancellationSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires the signal. Returns `true` only for the call that actually fired it.
    pub fn fire(&self) -> bool {
        let first = !self.fired.swap(true, Ordering::SeqCst);
        if first {
            self.token.cancel();
        }
        first
    }

    pub fn is_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// Derives the execution context handed to `service`'s `start`.
    pub fn context(&self, service: impl Into<String>) -> ExecutionContext {
        ExecutionContext {
            service: Arc::from(service.into()),
            token: self.token.child_token(),
        }
    }
}

/// Cancellation-aware handle passed to [`Service::start`].
///
/// Cheap to clone; clones share the same cancellation state, so a service can hand copies
/// to the sub-tasks it spawns.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    service: Arc<str>,
    token: CancellationToken,
}

impl ExecutionContext {
    /// Name of the service this context was issued to.
    pub fn service_name(&self) -> &str {
        &self.service
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes once the node has requested shutdown.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Drives `fut` until it completes or shutdown is requested, whichever comes first.
    /// Returns `None` on cancellation.
    pub async fn run_until_cancelled<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            out = fut => Some(out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn fire_is_idempotent() {
        let signal = CancellationSignal::new();
        assert!(!signal.is_fired());
        assert!(signal.fire());
        assert!(!signal.fire());
        assert!(signal.is_fired());
    }

    #[tokio::test]
    async fn contexts_observe_fire_even_when_derived_late() {
        let signal = CancellationSignal::new();
        let early = signal.context("early");
        signal.fire();
        let late = signal.context("late");

        early.cancelled().await;
        late.cancelled().await;
        assert!(early.is_cancelled());
        assert!(late.is_cancelled());
        assert_eq!(late.service_name(), "late");
    }

    #[tokio::test]
    async fn run_until_cancelled_returns_none_after_fire() {
        let signal = CancellationSignal::new();
        let ctx = signal.context("svc");

        assert_eq!(ctx.run_until_cancelled(async { 7 }).await, Some(7));

        signal.fire();
        let out = ctx
            .run_until_cancelled(tokio::time::sleep(Duration::from_secs(3600)))
            .await;
        assert!(out.is_none());
    }

    #[test]
    fn service_error_from_str() {
        let err: ServiceError = "port in use".into();
        assert_eq!(err.to_string(), "port in use");
    }
}
