//! Shared fixtures and helpers for dispatch tests.

mod handlers;
mod probe;
mod world;

use std::sync::Arc;

use rstest::fixture;
use serde_json::{Value, json};

use crate::cancellation::CancellationRegistry;
use crate::registry::HandlerRegistry;
use crate::router::RequestRouter;
use crate::scheduler::Scheduler;
use crate::selector::{DocumentSelector, RegistrationOptions};

pub use handlers::{
    CancellableRequestHandler, DoublingRequestHandler, FailingRequestHandler, Fault,
    FaultingNotificationHandler, PanickingRequestHandler, RecordingNotificationHandler,
    RecordingRequestHandler, Recorder, SlowRequestHandler,
};
pub use probe::{ConcurrencyProbe, submit_jobs, wait_until, wait_until_idle};
pub use world::TestWorld;

/// Short job duration used by scheduler tests.
pub const SLEEP_TIME: std::time::Duration = std::time::Duration::from_millis(20);
/// Upper bound for work that should finish promptly.
pub const A_LONG_TIME: std::time::Duration = std::time::Duration::from_millis(500);

/// Recorder shared by the handlers of one test.
#[fixture]
pub fn recorder() -> Recorder {
    Recorder::default()
}

/// Registration options restricted to documents matching `pattern`.
pub fn options_for(pattern: &str) -> RegistrationOptions {
    let selector = DocumentSelector::for_pattern(pattern)
        .unwrap_or_else(|error| panic!("invalid test pattern '{pattern}': {error}"));
    RegistrationOptions::new().with_selector(selector)
}

/// Parameters naming `uri` as their text document.
pub fn document_params(uri: &str) -> Value {
    json!({ "textDocument": { "uri": uri } })
}

/// Builds a router over `registry` with a freshly started scheduler.
///
/// Must run inside a tokio runtime.
pub fn started_router(registry: HandlerRegistry) -> RequestRouter {
    let scheduler = Arc::new(Scheduler::new());
    scheduler
        .start()
        .unwrap_or_else(|error| panic!("scheduler failed to start: {error}"));
    RequestRouter::new(registry, Arc::new(CancellationRegistry::new()), scheduler)
}
