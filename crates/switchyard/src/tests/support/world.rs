//! BDD test world owning a runtime, a scheduler and the router under test.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{Value, json};
use tokio::runtime::{Builder, Runtime};
use tokio::sync::Notify;

use crate::builtin::{ShutdownHandler, ShutdownSignal, methods};
use crate::cancellation::CancellationRegistry;
use crate::errors::{JobError, SchedulerError};
use crate::message::{Message, Notification, Request, Response};
use crate::registry::HandlerRegistry;
use crate::router::RequestRouter;
use crate::scheduler::{ProcessType, Scheduler};

use super::handlers::{CancellableRequestHandler, Recorder};
use super::probe::{ConcurrencyProbe, wait_until, wait_until_idle};

/// Shared state exercised by BDD step implementations.
pub struct TestWorld {
    runtime: Runtime,
    /// Handlers registered before the router is built.
    pub registry: HandlerRegistry,
    router: Option<Arc<RequestRouter>>,
    /// Scheduler the router submits to.
    pub scheduler: Arc<Scheduler>,
    /// Log shared by recording handlers.
    pub recorder: Recorder,
    /// Probe shared by scheduler jobs.
    pub probe: Arc<ConcurrencyProbe>,
    shutdown: Option<ShutdownSignal>,
    started: Option<Arc<Notify>>,
    responses: HashMap<i64, Option<Response>>,
    dispose_elapsed: Option<Duration>,
}

impl TestWorld {
    /// Creates a world with an empty registry and an unstarted scheduler.
    pub fn new() -> Self {
        let runtime = Builder::new_multi_thread()
            .worker_threads(4)
            .enable_all()
            .build()
            .unwrap_or_else(|error| panic!("failed to build test runtime: {error}"));
        Self {
            runtime,
            registry: HandlerRegistry::new(),
            router: None,
            scheduler: Arc::new(Scheduler::new()),
            recorder: Recorder::default(),
            probe: ConcurrencyProbe::shared(),
            shutdown: None,
            started: None,
            responses: HashMap::new(),
            dispose_elapsed: None,
        }
    }

    /// Starts the scheduler on the world's runtime.
    pub fn start_scheduler(&self) {
        let _entered = self.runtime.enter();
        self.scheduler
            .start()
            .unwrap_or_else(|error| panic!("scheduler failed to start: {error}"));
    }

    /// Registers the built-in shutdown handler.
    pub fn register_shutdown(&mut self) {
        self.shutdown = Some(ShutdownHandler::register(&mut self.registry));
    }

    /// Registers a request handler that waits for cancellation.
    pub fn register_cancellable(&mut self, method: &str) {
        let handler = CancellableRequestHandler::default();
        self.started = Some(handler.started());
        self.registry.register_request(
            method,
            handler,
            crate::selector::RegistrationOptions::new(),
            ProcessType::Parallel,
        );
    }

    fn router(&mut self) -> Arc<RequestRouter> {
        if let Some(router) = &self.router {
            return Arc::clone(router);
        }
        self.start_scheduler();
        let registry = std::mem::take(&mut self.registry);
        let router = Arc::new(RequestRouter::new(
            registry,
            Arc::new(CancellationRegistry::new()),
            Arc::clone(&self.scheduler),
        ));
        self.router = Some(Arc::clone(&router));
        router
    }

    /// Dispatches a request and stores its response under `id`.
    pub fn send_request(&mut self, id: i64, method: &str, params: Option<Value>) {
        let router = self.router();
        let message = Message::from(Request::new(id, method, params));
        let response = self.runtime.block_on(router.dispatch(message));
        self.responses.insert(id, response);
    }

    /// Dispatches a notification.
    pub fn send_notification(&mut self, method: &str, params: Option<Value>) {
        let router = self.router();
        let message = Message::from(Notification::new(method, params));
        let response = self.runtime.block_on(router.dispatch(message));
        assert!(response.is_none(), "notifications are never answered");
    }

    /// Dispatches a request, cancels it once its handler is running and
    /// stores whatever the router produced.
    pub fn send_and_cancel(&mut self, id: i64, method: &str) {
        let router = self.router();
        let started = self
            .started
            .clone()
            .unwrap_or_else(|| panic!("no cancellable handler registered"));
        let request = Message::from(Request::new(id, method, None));
        let response = self.runtime.block_on(async move {
            let dispatching = Arc::clone(&router);
            let pending = tokio::spawn(async move { dispatching.dispatch(request).await });
            started.notified().await;
            let cancel = Notification::new(methods::CANCEL_REQUEST, Some(json!({ "id": id })));
            router.dispatch(Message::from(cancel)).await;
            pending
                .await
                .unwrap_or_else(|error| panic!("dispatch task failed: {error}"))
        });
        self.responses.insert(id, response);
    }

    /// Returns the response recorded for `id`.
    pub fn response(&self, id: i64) -> Option<&Response> {
        match self.responses.get(&id) {
            Some(response) => response.as_ref(),
            None => panic!("request {id} was never sent"),
        }
    }

    /// Number of requests the router still tracks.
    pub fn in_flight(&mut self) -> usize {
        self.router().cancellations().len()
    }

    /// Returns true once the shutdown handler has run.
    pub fn shutdown_requested(&self) -> bool {
        self.shutdown
            .as_ref()
            .is_some_and(ShutdownSignal::is_requested)
    }

    /// Waits until `label` has been invoked `count` times.
    pub fn wait_for_calls(&self, label: &str, count: usize) -> bool {
        let recorder = self.recorder.clone();
        self.runtime.block_on(wait_until(Duration::from_secs(2), || {
            recorder.count(label) >= count
        }))
    }

    /// Waits until the scheduler has no incomplete jobs.
    pub fn wait_until_idle(&self, limit: Duration) -> bool {
        self.runtime.block_on(wait_until_idle(&self.scheduler, limit))
    }

    /// Submits a serial job that sleeps for `duration`.
    pub fn submit_long_serial_job(&self, duration: Duration) {
        let submitted = self
            .scheduler
            .add(ProcessType::Serial, "long", move || async move {
                tokio::time::sleep(duration).await;
                Ok::<(), JobError>(())
            });
        assert!(submitted.is_ok(), "long job rejected: {submitted:?}");
    }

    /// Disposes the scheduler and records how long disposal took.
    pub fn dispose_scheduler(&mut self) {
        let started = Instant::now();
        self.scheduler.dispose();
        self.dispose_elapsed = Some(started.elapsed());
    }

    /// Time disposal took.
    pub fn dispose_elapsed(&self) -> Duration {
        self.dispose_elapsed
            .unwrap_or_else(|| panic!("scheduler was not disposed"))
    }

    /// Tries to submit a job after disposal.
    pub fn try_submit(&self) -> Result<(), SchedulerError> {
        self.scheduler
            .add(ProcessType::Parallel, "late", || async { Ok::<(), JobError>(()) })
    }
}
