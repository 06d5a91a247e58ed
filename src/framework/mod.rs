//! The service contract managed by the node.
//!
//! # Main Components
//!
//! - [`Service`] - Trait every managed subsystem implements
//! - [`ExecutionContext`] - Cancellation-aware handle given to [`Service::start`]
//! - [`CancellationSignal`] - One-shot, idempotent shutdown broadcast
//! - [`ServiceError`] - Errors services report back
//!
//! # Testing
//!
//! See [`mock`] module for a scriptable service that records its calls.

pub mod service;
pub mod mock;

pub use service::*;
