//! # Service Lifecycle & Orchestration
//!
//! This module owns the runtime lifecycle of the node: registering services, starting them
//! concurrently, and shutting them down deterministically.
//!
//! ## The Node Pattern
//!
//! Individual services are simple. Coordinating them is where the complexity lives, and
//! [`Node`] is the conductor:
//!
//! ```text
//! NotStarted --start()--> Running --stop()--> Stopping --drained--> Stopped
//! ```
//!
//! **Key Responsibilities:**
//! 1. **Registration** - Collect services in order before anything runs
//! 2. **Concurrent Start** - One task per service, launched in registration order
//! 3. **Cancellation** - One shared, idempotent signal fanned out through each
//!    [`ExecutionContext`](crate::framework::ExecutionContext)
//! 4. **Ordered Shutdown** - `stop` on each service in reverse order, then join every task
//! 5. **Failure Isolation** - A failing or panicking service is reported, never escalated
//!
//! ## Graceful Shutdown
//!
//! 1. **Fire the signal** - Every `start` sees its context cancelled
//! 2. **Stop in reverse** - Later services depend on earlier ones, so they go first
//! 3. **Drain** - Wait until every start task has returned
//!
//! A service that ignores cancellation would hang step 3. Configure
//! [`NodeBuilder::drain_timeout`] to bound it.
//!
//! ## Observability & Tracing
//!
//! See the [`tracing`] module for [`setup_tracing`] and the log lines the node emits.

pub mod node;
pub mod signals;
pub mod tracing;

pub use node::*;
pub use signals::*;
pub use self::tracing::*;
