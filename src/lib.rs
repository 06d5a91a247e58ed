//! # Beamlight
//!
//! > **The orchestration kernel of the beamlight node.**
//!
//! The node process will host networking, consensus, storage and metrics subsystems. This
//! crate is the part that ties them together: it registers independently-implemented
//! services, starts them concurrently, and shuts them down deterministically and safely.
//!
//! ## 🏗️ Design Philosophy
//!
//! - **Decoupling**: Subsystems only implement the three-method [`Service`](framework::Service)
//!   contract. The node never constructs a service or touches its state.
//! - **Explicit State Machine**: The node is `NotStarted`, `Running`, `Stopping` or `Stopped`,
//!   transitioned under a single lock that is never held across a service call.
//! - **Structured Concurrency**: Every service start runs in a tracked task. Shutdown is an
//!   explicit barrier that joins them all, not an implicit counter.
//!
//! ## 👩‍💻 Architecture Notes
//!
//! ### 1. Type-Safe Error Handling
//! Sequencing mistakes (`start` twice, `stop` before `start`) come back as
//! [`LifecycleError`](error::LifecycleError). Service failures are logged and recorded per
//! service name and never abort the node. Registering after `start` is a programmer error and
//! panics with a documented message.
//!
//! ### 2. Cancellation
//! One [`CancellationSignal`](framework::CancellationSignal) per node. Each service gets an
//! [`ExecutionContext`](framework::ExecutionContext) derived from it and is expected to return
//! once it is cancelled.
//!
//! ### 3. Observability
//! `tracing` everywhere with a `service` field on every per-service line. See
//! [`lifecycle::tracing`].
//!
//! ## 🗺️ Module Tour
//!
//! ### 1. The Contract ([`framework`])
//! - **Role**: What a subsystem must provide to be managed.
//! - **Key items**: [`Service`](framework::Service), [`ExecutionContext`](framework::ExecutionContext),
//!   [`MockService`](framework::mock::MockService).
//!
//! ### 2. The Orchestrator ([`lifecycle`])
//! - **Role**: Registers, starts and stops services; installs logging; waits for OS signals.
//! - **Key items**: [`Node`](lifecycle::Node), [`stop`](lifecycle::Node::stop).
//!
//! ### 3. The Configuration ([`config`])
//! - **Role**: The populated settings handed to services at construction time.
//! - **Key items**: [`NodeConfig`](config::NodeConfig).
//!
//! ## 🚀 Quick Start
//!
//! ```bash
//! RUST_LOG=info cargo run
//! cargo test
//! ```

pub mod config;
pub mod error;
pub mod framework;
pub mod lifecycle;
