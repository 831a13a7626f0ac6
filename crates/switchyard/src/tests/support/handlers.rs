//! Handler doubles that record how they were invoked.

use std::future::{self, Future};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::errors::HandlerError;
use crate::handler::{NotificationHandler, RequestHandler};

/// Invocation captured by a recording handler.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    /// Label of the handler that ran.
    pub label: String,
    /// Parameters it received.
    pub params: Value,
}

/// Shared log of handler invocations.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl Recorder {
    fn record(&self, label: &str, params: Value) {
        self.calls.lock().push(Call {
            label: label.to_owned(),
            params,
        });
    }

    /// Labels of the handlers that ran, in invocation order.
    pub fn labels(&self) -> Vec<String> {
        self.calls.lock().iter().map(|call| call.label.clone()).collect()
    }

    /// Every recorded call.
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    /// Number of calls made by the handler with `label`.
    pub fn count(&self, label: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.label == label)
            .count()
    }
}

/// Request handler answering with its own label.
#[derive(Debug, Clone)]
pub struct RecordingRequestHandler {
    label: String,
    recorder: Recorder,
}

impl RecordingRequestHandler {
    pub fn new(label: &str, recorder: &Recorder) -> Self {
        Self {
            label: label.to_owned(),
            recorder: recorder.clone(),
        }
    }
}

impl RequestHandler for RecordingRequestHandler {
    type Params = Value;
    type Output = Value;

    fn handle(
        &self,
        params: Value,
        _token: CancellationToken,
    ) -> impl Future<Output = Result<Value, HandlerError>> + Send {
        self.recorder.record(&self.label, params);
        future::ready(Ok(json!({ "handledBy": self.label })))
    }
}

/// Notification handler that records every invocation.
#[derive(Debug, Clone)]
pub struct RecordingNotificationHandler {
    label: String,
    recorder: Recorder,
}

impl RecordingNotificationHandler {
    pub fn new(label: &str, recorder: &Recorder) -> Self {
        Self {
            label: label.to_owned(),
            recorder: recorder.clone(),
        }
    }
}

impl NotificationHandler for RecordingNotificationHandler {
    type Params = Value;

    fn handle(&self, params: Value) -> impl Future<Output = Result<(), HandlerError>> + Send {
        self.recorder.record(&self.label, params);
        future::ready(Ok(()))
    }
}

/// How a faulting notification handler misbehaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Returns a handler error.
    Error,
    /// Panics while running.
    Panic,
}

/// Notification handler that records and then fails.
#[derive(Debug, Clone)]
pub struct FaultingNotificationHandler {
    fault: Fault,
    recorder: Recorder,
}

impl FaultingNotificationHandler {
    pub fn new(fault: Fault, recorder: &Recorder) -> Self {
        Self {
            fault,
            recorder: recorder.clone(),
        }
    }
}

impl NotificationHandler for FaultingNotificationHandler {
    type Params = Value;

    fn handle(&self, params: Value) -> impl Future<Output = Result<(), HandlerError>> + Send {
        let fault = self.fault;
        let recorder = self.recorder.clone();
        async move {
            recorder.record("faulting", params);
            match fault {
                Fault::Error => Err(HandlerError::new("notification failed")),
                Fault::Panic => panic!("notification handler exploded"),
            }
        }
    }
}

/// Request handler that always fails with the configured error.
#[derive(Debug, Clone)]
pub struct FailingRequestHandler {
    error: HandlerError,
}

impl FailingRequestHandler {
    pub const fn new(error: HandlerError) -> Self {
        Self { error }
    }
}

impl RequestHandler for FailingRequestHandler {
    type Params = Value;
    type Output = Value;

    fn handle(
        &self,
        _params: Value,
        _token: CancellationToken,
    ) -> impl Future<Output = Result<Value, HandlerError>> + Send {
        future::ready(Err(self.error.clone()))
    }
}

/// Request handler that panics once polled.
#[derive(Debug, Clone, Copy, Default)]
pub struct PanickingRequestHandler;

impl RequestHandler for PanickingRequestHandler {
    type Params = Value;
    type Output = Value;

    fn handle(
        &self,
        _params: Value,
        _token: CancellationToken,
    ) -> impl Future<Output = Result<Value, HandlerError>> + Send {
        async { explode() }
    }
}

fn explode() -> Result<Value, HandlerError> {
    panic!("request handler exploded")
}

/// Parameters with a required field.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CountParams {
    /// Value to double.
    pub count: u32,
}

/// Request handler with typed parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct DoublingRequestHandler;

impl RequestHandler for DoublingRequestHandler {
    type Params = CountParams;
    type Output = u32;

    fn handle(
        &self,
        params: CountParams,
        _token: CancellationToken,
    ) -> impl Future<Output = Result<u32, HandlerError>> + Send {
        future::ready(Ok(params.count.saturating_mul(2)))
    }
}

/// Request handler that signals when it starts and then waits to be
/// cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancellableRequestHandler {
    started: Arc<Notify>,
}

impl CancellableRequestHandler {
    /// Returns the notifier fired when the handler starts.
    pub fn started(&self) -> Arc<Notify> {
        Arc::clone(&self.started)
    }
}

impl RequestHandler for CancellableRequestHandler {
    type Params = Value;
    type Output = Value;

    fn handle(
        &self,
        _params: Value,
        token: CancellationToken,
    ) -> impl Future<Output = Result<Value, HandlerError>> + Send {
        let started = Arc::clone(&self.started);
        async move {
            started.notify_one();
            token.cancelled().await;
            Ok(json!("observed cancellation"))
        }
    }
}

/// Request handler that sleeps before answering.
#[derive(Debug, Clone)]
pub struct SlowRequestHandler {
    delay: Duration,
    recorder: Recorder,
}

impl SlowRequestHandler {
    pub fn new(delay: Duration, recorder: &Recorder) -> Self {
        Self {
            delay,
            recorder: recorder.clone(),
        }
    }
}

impl RequestHandler for SlowRequestHandler {
    type Params = Value;
    type Output = Value;

    fn handle(
        &self,
        params: Value,
        _token: CancellationToken,
    ) -> impl Future<Output = Result<Value, HandlerError>> + Send {
        let delay = self.delay;
        let recorder = self.recorder.clone();
        async move {
            tokio::time::sleep(delay).await;
            recorder.record("slow", params);
            Ok(json!("slow"))
        }
    }
}
