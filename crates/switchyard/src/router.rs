//! Method and capability routing for incoming messages.
//!
//! The router resolves a message to the handlers that should run for it,
//! submits one job per handler to the scheduler and turns request outcomes
//! into exactly one [`Response`]. Requests are tracked in the cancellation
//! registry from the moment they are routed until their response exists.

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::future::{self, BoxFuture};
use serde_json::Value;
use switchyard_config::{Config, default_suppress_cancelled_responses};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::builtin::{CancelRequestHandler, methods};
use crate::cancellation::{CancellationRegistry, CancellationTicket};
use crate::errors::{DispatchError, JobError};
use crate::handler::ErasedHandler;
use crate::matcher::CapabilityMatcher;
use crate::message::{Message, MessageKind, Notification, Request, RequestId, Response};
use crate::registry::{HandlerDescriptor, HandlerRegistry};
use crate::scheduler::{ProcessType, Scheduler, panic_message};
use crate::selector::RegistrationOptions;

/// Tracing target for routing operations.
pub(crate) const ROUTER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::router");

/// A request with the handlers selected for it.
#[derive(Debug, Clone)]
pub struct ResolvedRequest {
    request: Request,
    handlers: Vec<HandlerDescriptor>,
}

impl ResolvedRequest {
    /// Returns the request.
    #[must_use]
    pub const fn request(&self) -> &Request {
        &self.request
    }

    /// Returns every matching handler in registration order.
    #[must_use]
    pub fn handlers(&self) -> &[HandlerDescriptor] {
        &self.handlers
    }

    /// Returns the handler that will answer the request: the earliest
    /// registered match.
    #[must_use]
    pub fn authoritative(&self) -> Option<&HandlerDescriptor> {
        self.handlers.first()
    }
}

/// A notification with every handler selected for it.
#[derive(Debug, Clone)]
pub struct ResolvedNotification {
    notification: Notification,
    handlers: Vec<HandlerDescriptor>,
}

impl ResolvedNotification {
    /// Returns the notification.
    #[must_use]
    pub const fn notification(&self) -> &Notification {
        &self.notification
    }

    /// Returns the handlers the notification fans out to.
    #[must_use]
    pub fn handlers(&self) -> &[HandlerDescriptor] {
        &self.handlers
    }
}

/// Outcome of a successful [`RequestRouter::resolve`].
#[derive(Debug, Clone)]
pub enum ResolvedDispatch {
    /// A request and its candidate handlers.
    Request(ResolvedRequest),
    /// A notification and its fan-out handlers.
    Notification(ResolvedNotification),
}

/// A message that could not be resolved to any handler.
#[derive(Debug, Clone)]
pub struct ResolveFailure {
    message: Box<Message>,
    error: DispatchError,
}

impl ResolveFailure {
    /// Returns the unresolved message.
    #[must_use]
    pub fn message(&self) -> &Message {
        &self.message
    }

    /// Returns the resolution error.
    #[must_use]
    pub const fn error(&self) -> &DispatchError {
        &self.error
    }

    /// Builds the error response owed to the client. Notifications are never
    /// answered, so they yield `None`.
    #[must_use]
    pub fn into_response(self) -> Option<Response> {
        match *self.message {
            Message::Request(request) => {
                Some(Response::failure(request.id, self.error.to_response_error()))
            }
            Message::Notification(_) => None,
        }
    }
}

/// Future resolving to the single response for a routed request.
pub struct PendingResponse {
    inner: BoxFuture<'static, Response>,
}

impl PendingResponse {
    fn ready(response: Response) -> Self {
        Self {
            inner: future::ready(response).boxed(),
        }
    }
}

impl Future for PendingResponse {
    type Output = Response;

    fn poll(mut self: Pin<&mut Self>, context: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.poll_unpin(context)
    }
}

impl fmt::Debug for PendingResponse {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_struct("PendingResponse").finish_non_exhaustive()
    }
}

/// Ends a request's cancellation entry however its response future finishes.
struct InFlight {
    registry: Arc<CancellationRegistry>,
    ticket: CancellationTicket,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.registry.end(&self.ticket);
    }
}

/// Routes messages to registered handlers on the scheduler.
#[derive(Debug)]
pub struct RequestRouter {
    registry: Arc<HandlerRegistry>,
    cancellations: Arc<CancellationRegistry>,
    scheduler: Arc<Scheduler>,
    matcher: CapabilityMatcher,
    suppress_cancelled: bool,
}

impl RequestRouter {
    /// Builds a router over a populated registry.
    ///
    /// A cancel handler bound to `cancellations` is registered under
    /// `$/cancelRequest` unless the registry already has a notification
    /// handler for that method.
    #[must_use]
    pub fn new(
        mut registry: HandlerRegistry,
        cancellations: Arc<CancellationRegistry>,
        scheduler: Arc<Scheduler>,
    ) -> Self {
        let has_cancel_handler = registry
            .handlers_for(methods::CANCEL_REQUEST)
            .iter()
            .any(|descriptor| descriptor.kind() == MessageKind::Notification);
        if !has_cancel_handler {
            registry.register_notification(
                methods::CANCEL_REQUEST,
                CancelRequestHandler::new(Arc::clone(&cancellations)),
                RegistrationOptions::new(),
                ProcessType::Parallel,
            );
        }

        Self {
            registry: Arc::new(registry),
            cancellations,
            scheduler,
            matcher: CapabilityMatcher::new(),
            suppress_cancelled: default_suppress_cancelled_responses(),
        }
    }

    /// Applies configuration that affects routing.
    #[must_use]
    pub fn with_config(mut self, config: &Config) -> Self {
        self.suppress_cancelled = config.suppress_cancelled_responses();
        self
    }

    /// Returns the handler registry.
    #[must_use]
    pub const fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    /// Returns the cancellation registry.
    #[must_use]
    pub const fn cancellations(&self) -> &Arc<CancellationRegistry> {
        &self.cancellations
    }

    /// Returns the scheduler jobs are submitted to.
    #[must_use]
    pub const fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    /// Resolves a message to the handlers that should run for it.
    ///
    /// # Errors
    ///
    /// Returns a [`ResolveFailure`] carrying [`DispatchError::MethodNotFound`]
    /// when no handler of the message's kind is registered for its method, or
    /// [`DispatchError::NoMatchingHandler`] when none accepts its document.
    pub fn resolve(&self, message: Message) -> Result<ResolvedDispatch, ResolveFailure> {
        let kind = message.kind();
        let candidates: Vec<&HandlerDescriptor> = self
            .registry
            .handlers_for(message.method())
            .iter()
            .filter(|descriptor| descriptor.kind() == kind)
            .collect();
        if candidates.is_empty() {
            let error = DispatchError::method_not_found(message.method());
            return Err(ResolveFailure {
                message: Box::new(message),
                error,
            });
        }

        let handlers: Vec<HandlerDescriptor> = self
            .matcher
            .select(&candidates, kind, message.params())
            .into_iter()
            .cloned()
            .collect();
        if handlers.is_empty() {
            let error = DispatchError::no_matching_handler(message.method(), kind);
            return Err(ResolveFailure {
                message: Box::new(message),
                error,
            });
        }

        Ok(match message {
            Message::Request(request) => {
                ResolvedDispatch::Request(ResolvedRequest { request, handlers })
            }
            Message::Notification(notification) => {
                ResolvedDispatch::Notification(ResolvedNotification {
                    notification,
                    handlers,
                })
            }
        })
    }

    /// Submits a resolved request and returns the future of its response.
    ///
    /// The cancellation token is registered before this returns, so a cancel
    /// arriving at any later point reaches the handler. The returned future
    /// always resolves to exactly one response and never borrows the router.
    pub fn route_request(&self, resolved: ResolvedRequest) -> PendingResponse {
        let ResolvedRequest { request, handlers } = resolved;
        let Request { id, method, params } = request;
        let selected = handlers
            .first()
            .and_then(|descriptor| match descriptor.handler().erased() {
                ErasedHandler::Request(handler) => {
                    Some((Arc::clone(handler), descriptor.process_type(), descriptor))
                }
                ErasedHandler::Notification(_) => None,
            });
        let Some((handler, process_type, descriptor)) = selected else {
            let error = DispatchError::no_matching_handler(&method, MessageKind::Request);
            return PendingResponse::ready(Response::failure(id, error.to_response_error()));
        };

        debug!(
            target: ROUTER_TARGET,
            %method,
            request_id = %id,
            handler = descriptor.handler().type_name(),
            lane = %process_type,
            "routing request"
        );

        let ticket = self.cancellations.begin(id.clone());
        let token = ticket.token().clone();
        let in_flight = InFlight {
            registry: Arc::clone(&self.cancellations),
            ticket,
        };
        let (sender, receiver) = oneshot::channel::<Result<Value, DispatchError>>();

        let job_method = method.clone();
        let submitted = self
            .scheduler
            .add(process_type, format!("{method}#{id}"), move || async move {
                let outcome = if token.is_cancelled() {
                    Err(DispatchError::cancelled(&job_method))
                } else {
                    let invocation = handler.invoke(job_method.clone(), params, token.clone());
                    let result = match AssertUnwindSafe(invocation).catch_unwind().await {
                        Ok(result) => result,
                        Err(payload) => Err(DispatchError::job_fault(
                            &job_method,
                            panic_message(payload.as_ref()),
                        )),
                    };
                    if token.is_cancelled() {
                        Err(DispatchError::cancelled(&job_method))
                    } else {
                        result
                    }
                };
                sender
                    .send(outcome)
                    .map_err(|_| JobError::failed("response was no longer awaited"))
            });

        if let Err(source) = submitted {
            drop(in_flight);
            let error = DispatchError::scheduler(&method, source);
            warn!(target: ROUTER_TARGET, %method, request_id = %id, %error, "request rejected");
            return PendingResponse::ready(Response::failure(id, error.to_response_error()));
        }

        PendingResponse {
            inner: async move {
                let outcome = receiver.await;
                drop(in_flight);
                response_from(id, &method, outcome)
            }
            .boxed(),
        }
    }

    /// Submits one job per handler of a resolved notification.
    ///
    /// Handler failures are logged and never reach the caller.
    pub fn route_notification(&self, resolved: ResolvedNotification) {
        let ResolvedNotification {
            notification,
            handlers,
        } = resolved;
        let Notification { method, params } = notification;

        for descriptor in &handlers {
            let ErasedHandler::Notification(handler) = descriptor.handler().erased() else {
                continue;
            };
            let job_handler = Arc::clone(handler);
            let job_method = method.clone();
            let job_params = params.clone();
            let submitted = self
                .scheduler
                .add(descriptor.process_type(), method.clone(), move || async move {
                    job_handler
                        .invoke(job_method, job_params)
                        .await
                        .map_err(|error| JobError::failed(error.to_string()))
                });
            if let Err(error) = submitted {
                warn!(
                    target: ROUTER_TARGET,
                    %method,
                    handler = descriptor.handler().type_name(),
                    %error,
                    "notification rejected"
                );
            }
        }
    }

    /// Cancels an in-flight request. Unknown ids are ignored.
    pub fn cancel_request(&self, id: &RequestId) -> bool {
        self.cancellations.cancel(id)
    }

    /// Resolves and routes a message in one step.
    ///
    /// Returns the response owed to the client: `None` for notifications and,
    /// when configured, for cancelled requests.
    pub async fn dispatch(&self, message: Message) -> Option<Response> {
        match self.resolve(message) {
            Ok(ResolvedDispatch::Request(resolved)) => {
                let response = self.route_request(resolved).await;
                if response.is_cancelled() && self.suppress_cancelled {
                    debug!(
                        target: ROUTER_TARGET,
                        request_id = %response.id,
                        "cancelled response withheld"
                    );
                    return None;
                }
                Some(response)
            }
            Ok(ResolvedDispatch::Notification(resolved)) => {
                self.route_notification(resolved);
                None
            }
            Err(failure) => {
                debug!(
                    target: ROUTER_TARGET,
                    method = failure.message().method(),
                    error = %failure.error(),
                    "message not resolved"
                );
                failure.into_response()
            }
        }
    }
}

fn response_from(
    id: RequestId,
    method: &str,
    outcome: Result<Result<Value, DispatchError>, oneshot::error::RecvError>,
) -> Response {
    match outcome {
        Ok(Ok(value)) => Response::success(id, value),
        Ok(Err(DispatchError::Cancelled { .. })) => {
            debug!(target: ROUTER_TARGET, %method, request_id = %id, "request cancelled");
            Response::cancelled(id)
        }
        Ok(Err(error)) => {
            warn!(target: ROUTER_TARGET, %method, request_id = %id, %error, "request failed");
            Response::failure(id, error.to_response_error())
        }
        Err(_) => {
            let error = DispatchError::abandoned(method);
            warn!(target: ROUTER_TARGET, %method, request_id = %id, %error, "request abandoned");
            Response::failure(id, error.to_response_error())
        }
    }
}
