use crate::error::LifecycleError;
use crate::framework::{CancellationSignal, Service};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

/// Lifecycle state of a [`Node`].
///
/// `NotStarted -> Running -> Stopping -> Stopped`. `Stopping` only exists while
/// [`Node::stop`] is draining services; a stopped node cannot be started again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    NotStarted,
    Running,
    Stopping,
    Stopped,
}

/// Which service call produced a [`ServiceFailure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Start,
    Stop,
}

/// A failure reported by one service. Never fatal to the node or to other services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceFailure {
    pub service: String,
    pub phase: Phase,
    pub message: String,
}

/// State guarded by the node's single lock.
struct Inner {
    state: NodeState,
    services: Vec<Arc<dyn Service>>,
}

/// Registration-index -> name of every start task that has not returned yet.
type InFlight = Arc<Mutex<BTreeMap<usize, String>>>;

/// Removes its entry from the in-flight set when the start task finishes, however it finishes.
struct InFlightGuard {
    index: usize,
    in_flight: InFlight,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        lock(&self.in_flight).remove(&self.index);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn record(failures: &Mutex<Vec<ServiceFailure>>, service: &str, phase: Phase, message: String) {
    lock(failures).push(ServiceFailure {
        service: service.to_string(),
        phase,
        message,
    });
}

fn pending(in_flight: &Mutex<BTreeMap<usize, String>>) -> Vec<String> {
    lock(in_flight).values().cloned().collect()
}

/// Everything the stop protocol needs, owned so it can run on its own task.
struct Shutdown {
    services: Vec<Arc<dyn Service>>,
    inner: Arc<Mutex<Inner>>,
    signal: CancellationSignal,
    tasks: TaskTracker,
    in_flight: InFlight,
    failures: Arc<Mutex<Vec<ServiceFailure>>>,
    drain_timeout: Option<Duration>,
}

impl Shutdown {
    async fn run(self) -> Result<(), LifecycleError> {
        info!(count = self.services.len(), "Stopping node");
        self.signal.fire();

        for service in self.services.iter().rev() {
            let name = service.name().to_string();
            info!(service = %name, "Stopping service");

            let service = Arc::clone(service);
            let outcome = tokio::spawn(async move { service.stop().await })
                .await
                .map_err(|e| e.to_string())
                .and_then(|res| res.map_err(|e| e.to_string()));
            if let Err(message) = outcome {
                error!(service = %name, error = %message, "Error stopping service");
                record(&self.failures, &name, Phase::Stop, message);
            }
        }

        let drained = self.drain().await;
        lock(&self.inner).state = NodeState::Stopped;

        match drained {
            Ok(()) => {
                info!("All services stopped");
                Ok(())
            }
            Err(pending) => {
                warn!(?pending, "Abandoning services that did not exit in time");
                Err(LifecycleError::DrainTimeout { pending })
            }
        }
    }

    async fn drain(&self) -> Result<(), Vec<String>> {
        match self.drain_timeout {
            None => {
                self.tasks.wait().await;
                Ok(())
            }
            Some(limit) => tokio::time::timeout(limit, self.tasks.wait())
                .await
                .map_err(|_| pending(&self.in_flight)),
        }
    }
}

/// The service lifecycle orchestrator.
///
/// `Node` owns the ordered list of registered services, one [`CancellationSignal`] and the
/// group of start tasks. It is the only mutable entity of the node process.
///
/// # Ordering
///
/// - Start tasks are launched in registration order (completion order is up to the services).
/// - `stop` is called on services in **reverse** registration order, one at a time. Services
///   registered later are assumed to depend on earlier ones, so they are torn down first.
///
/// # Locking
///
/// A single lock guards the state and the service list. It is never held across a call into
/// a service, so a slow or misbehaving service cannot block `register`/`start`/`stop` checks.
///
/// # Known Limitation
///
/// Without a [drain timeout](NodeBuilder::drain_timeout), a service whose `start` ignores
/// cancellation blocks [`stop`](Node::stop) forever.
///
/// # Example
///
/// ```ignore
/// let node = Node::new();
/// node.register(network);
/// node.register(consensus);
///
/// node.start()?;
/// // ... wait for SIGINT/SIGTERM ...
/// node.stop().await?;
/// ```
pub struct Node {
    inner: Arc<Mutex<Inner>>,
    signal: CancellationSignal,
    tasks: TaskTracker,
    in_flight: InFlight,
    failures: Arc<Mutex<Vec<ServiceFailure>>>,
    drain_timeout: Option<Duration>,
}

/// Builder for [`Node`].
#[derive(Debug, Clone, Default)]
pub struct NodeBuilder {
    drain_timeout: Option<Duration>,
}

impl NodeBuilder {
    /// Bounds how long [`Node::stop`] waits for start tasks to return. Tasks still running
    /// when it elapses are abandoned and reported through [`LifecycleError::DrainTimeout`].
    pub fn drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Node {
        let tasks = TaskTracker::new();
        // Closed up front so `wait` resolves whenever no start task is live.
        tasks.close();

        Node {
            inner: Arc::new(Mutex::new(Inner {
                state: NodeState::NotStarted,
                services: Vec::new(),
            })),
            signal: CancellationSignal::new(),
            tasks,
            in_flight: Arc::default(),
            failures: Arc::default(),
            drain_timeout: self.drain_timeout,
        }
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::new()
    }
}

impl Node {
    /// Creates a node with no services and no drain deadline.
    pub fn new() -> Self {
        NodeBuilder::default().build()
    }

    pub fn builder() -> NodeBuilder {
        NodeBuilder::default()
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Appends `service` to the node.
    ///
    /// # Panics
    ///
    /// Panics with `cannot register service <name> after node has started` if the node has
    /// left [`NodeState::NotStarted`]. That is a construction-order bug, not a runtime
    /// condition. Use [`try_register`](Node::try_register) to get the error instead.
    pub fn register<S: Service>(&self, service: S) {
        if let Err(e) = self.try_register(service) {
            panic!("{e}");
        }
    }

    /// Appends `service` to the node, or returns [`LifecycleError::RegisterAfterStart`].
    pub fn try_register<S: Service>(&self, service: S) -> Result<(), LifecycleError> {
        let mut inner = self.lock();
        if inner.state != NodeState::NotStarted {
            return Err(LifecycleError::RegisterAfterStart {
                service: service.name().to_string(),
            });
        }

        if inner.services.iter().any(|s| s.name() == service.name()) {
            warn!(service = %service.name(), "Registering duplicate service name");
        }
        debug!(service = %service.name(), position = inner.services.len(), "Registered service");
        inner.services.push(Arc::new(service));
        Ok(())
    }

    // =========================================================================
    // Start
    // =========================================================================

    /// Launches one task per registered service, in registration order, and moves the node
    /// to [`NodeState::Running`].
    ///
    /// Returns as soon as every task has been spawned; it does not wait for services to
    /// initialise. A service whose `start` fails or panics is recorded in
    /// [`failures`](Node::failures) and does not affect the others.
    ///
    /// Fails with [`LifecycleError::NoRuntime`] outside a Tokio runtime, leaving the node in
    /// [`NodeState::NotStarted`].
    pub fn start(&self) -> Result<(), LifecycleError> {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(LifecycleError::NoRuntime);
        }

        let mut inner = self.lock();
        if inner.state != NodeState::NotStarted {
            return Err(LifecycleError::AlreadyStarted);
        }

        info!(count = inner.services.len(), "Starting node");

        for (index, service) in inner.services.iter().enumerate() {
            let name = service.name().to_string();
            info!(service = %name, "Starting service");

            lock(&self.in_flight).insert(index, name.clone());
            let guard = InFlightGuard {
                index,
                in_flight: Arc::clone(&self.in_flight),
            };
            let ctx = self.signal.context(name.clone());
            let service = Arc::clone(service);
            let failures = Arc::clone(&self.failures);

            self.tasks.spawn(async move {
                let _guard = guard;
                // Inner task so a panicking service is reported instead of tearing through.
                match tokio::spawn(async move { service.start(ctx).await }).await {
                    Ok(Ok(())) => debug!(service = %name, "Service exited"),
                    Ok(Err(e)) => {
                        error!(service = %name, error = %e, "Error starting service");
                        record(&failures, &name, Phase::Start, e.to_string());
                    }
                    Err(e) => {
                        error!(service = %name, error = %e, "Service task failed");
                        record(&failures, &name, Phase::Start, e.to_string());
                    }
                }
            });
        }

        inner.state = NodeState::Running;
        Ok(())
    }

    // =========================================================================
    // Stop
    // =========================================================================

    /// Shuts the node down.
    ///
    /// 1. Fires the cancellation signal (once).
    /// 2. Calls `stop` on every service in reverse registration order, sequentially.
    ///    Failures are recorded and do not interrupt the sequence.
    /// 3. Waits for every start task to return (bounded by the drain timeout, if any).
    /// 4. Moves the node to [`NodeState::Stopped`].
    ///
    /// Steps 1-4 run on their own task. Dropping the returned future (a timeout, a `select!`)
    /// does not interrupt them; the node still reaches `Stopped` and every service is still
    /// asked to stop exactly once.
    pub async fn stop(&self) -> Result<(), LifecycleError> {
        let services = {
            let mut inner = self.lock();
            match inner.state {
                NodeState::Running => {}
                NodeState::Stopping => return Err(LifecycleError::StopInProgress),
                NodeState::NotStarted | NodeState::Stopped => {
                    return Err(LifecycleError::NotStarted)
                }
            }
            inner.state = NodeState::Stopping;
            inner.services.clone()
        };

        let shutdown = Shutdown {
            services,
            inner: Arc::clone(&self.inner),
            signal: self.signal.clone(),
            tasks: self.tasks.clone(),
            in_flight: Arc::clone(&self.in_flight),
            failures: Arc::clone(&self.failures),
            drain_timeout: self.drain_timeout,
        };

        // Detached: dropping this future must not strand the node in `Stopping`.
        match tokio::spawn(shutdown.run()).await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => Err(LifecycleError::StopInProgress),
        }
    }

    /// Blocks until every start task has returned. Resolves immediately if none are live.
    pub async fn wait(&self) {
        self.tasks.wait().await
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    pub fn state(&self) -> NodeState {
        self.lock().state
    }

    /// Registered service names, in registration order.
    pub fn service_names(&self) -> Vec<String> {
        self.lock()
            .services
            .iter()
            .map(|s| s.name().to_string())
            .collect()
    }

    /// Number of start tasks launched but not yet returned.
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Names of services whose start task has not returned, in registration order.
    pub fn in_flight_services(&self) -> Vec<String> {
        pending(&self.in_flight)
    }

    /// Every start/stop failure reported so far.
    pub fn failures(&self) -> Vec<ServiceFailure> {
        lock(&self.failures).clone()
    }

    /// Whether shutdown has been requested.
    pub fn is_shutdown_requested(&self) -> bool {
        self.signal.is_fired()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        lock(&self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::mock::{EventLog, MockService};

    #[tokio::test]
    async fn register_does_not_touch_state() {
        let log = EventLog::new();
        let node = Node::new();
        node.register(MockService::new("a", &log));
        node.register(MockService::new("b", &log));

        assert_eq!(node.state(), NodeState::NotStarted);
        assert_eq!(node.service_names(), vec!["a", "b"]);
        assert_eq!(node.in_flight(), 0);
    }

    #[tokio::test]
    async fn try_register_after_start_is_rejected() {
        let log = EventLog::new();
        let node = Node::new();
        node.start().unwrap();

        let err = node.try_register(MockService::new("late", &log)).unwrap_err();
        assert_eq!(
            err,
            LifecycleError::RegisterAfterStart {
                service: "late".to_string()
            }
        );
        assert!(node.service_names().is_empty());
        assert_eq!(node.state(), NodeState::Running);
    }

    #[tokio::test]
    #[should_panic(expected = "cannot register service late after node has started")]
    async fn register_after_start_panics() {
        let log = EventLog::new();
        let node = Node::new();
        node.start().unwrap();
        node.register(MockService::new("late", &log));
    }

    #[tokio::test]
    async fn stop_before_start_does_not_fire_signal() {
        let node = Node::new();
        assert_eq!(node.stop().await, Err(LifecycleError::NotStarted));
        assert!(!node.is_shutdown_requested());
        assert_eq!(node.state(), NodeState::NotStarted);
    }

    #[tokio::test]
    async fn firing_twice_before_stop_is_harmless() {
        let log = EventLog::new();
        let node = Node::new();
        node.register(MockService::new("a", &log));
        node.start().unwrap();

        assert!(node.signal.fire());
        assert!(!node.signal.fire());

        node.stop().await.unwrap();
        assert_eq!(node.state(), NodeState::Stopped);
        assert_eq!(log.stops(), vec!["a"]);
    }

    #[tokio::test]
    async fn stop_twice_reports_not_started() {
        let node = Node::new();
        node.start().unwrap();
        node.stop().await.unwrap();

        assert_eq!(node.stop().await, Err(LifecycleError::NotStarted));
        assert_eq!(node.start(), Err(LifecycleError::AlreadyStarted));
    }

    #[tokio::test]
    async fn drain_timeout_abandons_stuck_services() {
        let log = EventLog::new();
        let node = Node::builder()
            .drain_timeout(Duration::from_millis(50))
            .build();
        node.register(MockService::new("quick", &log));
        node.register(MockService::new("stuck", &log).ignore_cancellation(Duration::from_secs(3600)));
        node.start().unwrap();

        let err = node.stop().await.unwrap_err();
        assert_eq!(
            err,
            LifecycleError::DrainTimeout {
                pending: vec!["stuck".to_string()]
            }
        );
        assert_eq!(node.state(), NodeState::Stopped);
        assert_eq!(node.in_flight_services(), vec!["stuck"]);
    }

    #[test]
    fn start_outside_runtime_is_rejected() {
        let log = EventLog::new();
        let svc = MockService::new("a", &log);
        let node = Node::new();
        node.register(svc.clone());

        assert_eq!(node.start(), Err(LifecycleError::NoRuntime));
        assert_eq!(node.state(), NodeState::NotStarted);
        assert_eq!(node.in_flight(), 0);
        assert_eq!(svc.start_calls(), 0);
    }

    #[tokio::test]
    async fn wait_before_start_returns_immediately() {
        let node = Node::new();
        node.wait().await;
        assert_eq!(node.in_flight(), 0);
    }
}
