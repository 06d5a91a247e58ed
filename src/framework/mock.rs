//! # Mock Services
//!
//! Utilities for testing the node without real subsystems.
//!
//! Create an [`EventLog`], hand it to as many [`MockService`]s as you like, and script each
//! one's behaviour with the builder methods. After driving the node, assert on the order of
//! recorded [`Event`]s.
//!
//! ```ignore
//! let log = EventLog::new();
//! let node = Node::new();
//! node.register(MockService::new("net", &log));
//! node.register(MockService::new("consensus", &log).fail_start("no genesis"));
//!
//! node.start()?;
//! node.stop().await?;
//! assert_eq!(log.stops(), vec!["consensus", "net"]);
//! ```

use crate::framework::{ExecutionContext, Service, ServiceError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

// =============================================================================
// EVENT LOG
// =============================================================================

/// Something a mock observed, tagged with the mock's name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// `start` was entered.
    Started(String),
    /// `start` returned.
    Exited(String),
    /// `stop` was called.
    Stopped(String),
}

/// Shared, ordered record of mock activity.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<Event>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, event: Event) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    /// Every event so far, in the order it happened.
    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Names of services whose `start` was entered, in order.
    pub fn starts(&self) -> Vec<String> {
        self.filter(|e| match e {
            Event::Started(n) => Some(n.clone()),
            _ => None,
        })
    }

    /// Names of services whose `start` returned, in order.
    pub fn exits(&self) -> Vec<String> {
        self.filter(|e| match e {
            Event::Exited(n) => Some(n.clone()),
            _ => None,
        })
    }

    /// Names of services whose `stop` was called, in order.
    pub fn stops(&self) -> Vec<String> {
        self.filter(|e| match e {
            Event::Stopped(n) => Some(n.clone()),
            _ => None,
        })
    }

    fn filter(&self, f: impl Fn(&Event) -> Option<String>) -> Vec<String> {
        self.events().iter().filter_map(f).collect()
    }
}

// =============================================================================
// MOCK SERVICE
// =============================================================================

/// What the mock does inside `start`.
#[derive(Debug, Clone)]
enum StartBehavior {
    /// Park until the context is cancelled, then return `Ok`.
    RunUntilCancelled,
    /// Return `Ok` right away.
    ReturnImmediately,
    /// Return this error right away.
    Fail(String),
    /// Panic right away.
    Panic(String),
    /// Keep running for this long regardless of cancellation.
    IgnoreCancellation(Duration),
}

/// A scriptable [`Service`] that records its calls into an [`EventLog`].
///
/// Clones share the same call counters, so a test can keep one clone for assertions
/// and register the other.
#[derive(Debug, Clone)]
pub struct MockService {
    name: String,
    log: EventLog,
    start: StartBehavior,
    stop_error: Option<String>,
    stop_delay: Option<Duration>,
    start_calls: Arc<AtomicUsize>,
    stop_calls: Arc<AtomicUsize>,
}

impl MockService {
    /// A well-behaved service that runs until cancelled.
    pub fn new(name: impl Into<String>, log: &EventLog) -> Self {
        Self {
            name: name.into(),
            log: log.clone(),
            start: StartBehavior::RunUntilCancelled,
            stop_error: None,
            stop_delay: None,
            start_calls: Arc::new(AtomicUsize::new(0)),
            stop_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// `start` returns `Ok` without waiting for cancellation.
    pub fn return_immediately(mut self) -> Self {
        self.start = StartBehavior::ReturnImmediately;
        self
    }

    /// `start` fails immediately with `msg`.
    pub fn fail_start(mut self, msg: impl Into<String>) -> Self {
        self.start = StartBehavior::Fail(msg.into());
        self
    }

    /// `start` panics immediately with `msg`.
    pub fn panic_on_start(mut self, msg: impl Into<String>) -> Self {
        self.start = StartBehavior::Panic(msg.into());
        self
    }

    /// `start` keeps running for `d` even after cancellation.
    pub fn ignore_cancellation(mut self, d: Duration) -> Self {
        self.start = StartBehavior::IgnoreCancellation(d);
        self
    }

    /// `stop` takes `d` to return.
    pub fn slow_stop(mut self, d: Duration) -> Self {
        self.stop_delay = Some(d);
        self
    }

    /// `stop` fails with `msg` (the call is still recorded).
    pub fn fail_stop(mut self, msg: impl Into<String>) -> Self {
        self.stop_error = Some(msg.into());
        self
    }

    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Service for MockService {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self, ctx: ExecutionContext) -> Result<(), ServiceError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        self.log.push(Event::Started(self.name.clone()));

        let result = match &self.start {
            StartBehavior::RunUntilCancelled => {
                ctx.cancelled().await;
                Ok(())
            }
            StartBehavior::ReturnImmediately => Ok(()),
            StartBehavior::Fail(msg) => Err(ServiceError::Failed(msg.clone())),
            StartBehavior::Panic(msg) => panic!("{}", msg),
            StartBehavior::IgnoreCancellation(d) => {
                tokio::time::sleep(*d).await;
                Ok(())
            }
        };

        self.log.push(Event::Exited(self.name.clone()));
        result
    }

    async fn stop(&self) -> Result<(), ServiceError> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        self.log.push(Event::Stopped(self.name.clone()));
        if let Some(d) = self.stop_delay {
            tokio::time::sleep(d).await;
        }

        match &self.stop_error {
            Some(msg) => Err(ServiceError::Failed(msg.clone())),
            None => Ok(()),
        }
    }
}
