//! # Lifecycle Errors
//!
//! Errors returned by the [`Node`](crate::lifecycle::Node) itself. Failures raised by individual
//! services never show up here; they are reported per service through
//! [`ServiceFailure`](crate::lifecycle::ServiceFailure) and the node keeps going.

/// Errors produced by the node's own state machine.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum LifecycleError {
    /// `start` was called on a node that is already running or has stopped.
    #[error("node already started")]
    AlreadyStarted,

    /// `start` was called outside a Tokio runtime.
    #[error("node must be started from within a Tokio runtime")]
    NoRuntime,

    /// `stop` was called on a node that is not running.
    #[error("node not started")]
    NotStarted,

    /// `stop` was called while another `stop` is still draining services.
    #[error("node stop already in progress")]
    StopInProgress,

    /// A service was registered after `start`. [`Node::register`](crate::lifecycle::Node::register)
    /// turns this into a panic; [`Node::try_register`](crate::lifecycle::Node::try_register)
    /// hands it back.
    #[error("cannot register service {service} after node has started")]
    RegisterAfterStart { service: String },

    /// The configured drain deadline elapsed with services still running.
    #[error("drain timed out with {} service(s) still running: {}", pending.len(), pending.join(", "))]
    DrainTimeout { pending: Vec<String> },
}
