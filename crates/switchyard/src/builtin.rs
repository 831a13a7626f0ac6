//! Handlers every host gets: request cancellation and shutdown.

use std::future::{self, Future};
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cancellation::CancellationRegistry;
use crate::errors::HandlerError;
use crate::handler::{NotificationHandler, RequestHandler};
use crate::message::RequestId;
use crate::registry::HandlerRegistry;
use crate::router::ROUTER_TARGET;
use crate::scheduler::ProcessType;
use crate::selector::RegistrationOptions;

/// Method names handled by the built-in handlers.
pub mod methods {
    /// Cancels an in-flight request.
    pub const CANCEL_REQUEST: &str = "$/cancelRequest";
    /// Asks the server to shut down.
    pub const SHUTDOWN: &str = "shutdown";
}

/// Parameters of a cancel notification.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CancelParams {
    /// Id of the request to cancel. Debug adapters send it as `requestId`.
    #[serde(alias = "requestId")]
    pub id: RequestId,
}

/// Cancels in-flight requests by id.
#[derive(Debug, Clone)]
pub struct CancelRequestHandler {
    registry: Arc<CancellationRegistry>,
}

impl CancelRequestHandler {
    /// Binds the handler to the registry the router tracks requests in.
    #[must_use]
    pub const fn new(registry: Arc<CancellationRegistry>) -> Self {
        Self { registry }
    }
}

impl NotificationHandler for CancelRequestHandler {
    type Params = CancelParams;

    fn handle(&self, params: Self::Params) -> impl Future<Output = Result<(), HandlerError>> + Send {
        self.registry.cancel(&params.id);
        future::ready(Ok(()))
    }
}

/// Answers `shutdown` and tells observers a shutdown was requested.
#[derive(Debug)]
pub struct ShutdownHandler {
    requested: watch::Sender<bool>,
}

impl ShutdownHandler {
    /// Creates the handler and the signal observers wait on.
    #[must_use]
    pub fn channel() -> (Self, ShutdownSignal) {
        let (requested, receiver) = watch::channel(false);
        (Self { requested }, ShutdownSignal { receiver })
    }

    /// Registers a shutdown handler on the serial lane and returns its
    /// signal.
    pub fn register(registry: &mut HandlerRegistry) -> ShutdownSignal {
        let (handler, signal) = Self::channel();
        registry.register_request(
            methods::SHUTDOWN,
            handler,
            RegistrationOptions::new(),
            ProcessType::Serial,
        );
        signal
    }
}

impl RequestHandler for ShutdownHandler {
    type Params = Value;
    type Output = ();

    fn handle(
        &self,
        _params: Value,
        _token: CancellationToken,
    ) -> impl Future<Output = Result<(), HandlerError>> + Send {
        info!(target: ROUTER_TARGET, "shutdown requested");
        self.requested.send_replace(true);
        future::ready(Ok(()))
    }
}

/// Observer side of a [`ShutdownHandler`].
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    receiver: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Returns true once a shutdown request has been handled.
    #[must_use]
    pub fn is_requested(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Waits for a shutdown request.
    ///
    /// Returns `false` if the handler was dropped without one arriving.
    pub async fn requested(&mut self) -> bool {
        self.receiver.wait_for(|requested| *requested).await.is_ok()
    }
}
