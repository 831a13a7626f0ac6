//! Handler traits and their type-erased adapters.
//!
//! Handlers are written against typed parameters. The registry stores them
//! behind object-safe adapters that decode the opaque JSON parameters, run the
//! handler and encode its result, so the router only ever deals with
//! `serde_json::Value`.

use std::any;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::errors::{DispatchError, HandlerError};
use crate::message::MessageKind;

/// Handles a request and produces its result.
///
/// The token is cancelled when the client cancels the request; handlers
/// should observe it at their suspension points.
pub trait RequestHandler: Send + Sync + 'static {
    /// Parameter type decoded from the request.
    type Params: DeserializeOwned + Send + 'static;
    /// Result type encoded into the response.
    type Output: Serialize + Send + 'static;

    /// Runs the request.
    fn handle(
        &self,
        params: Self::Params,
        token: CancellationToken,
    ) -> impl Future<Output = Result<Self::Output, HandlerError>> + Send;
}

/// Handles a notification. Notifications are never answered.
pub trait NotificationHandler: Send + Sync + 'static {
    /// Parameter type decoded from the notification.
    type Params: DeserializeOwned + Send + 'static;

    /// Runs the notification.
    fn handle(&self, params: Self::Params) -> impl Future<Output = Result<(), HandlerError>> + Send;
}

/// Decodes parameters, treating absent parameters as `null` and then `{}`.
pub(crate) fn decode_params<P: DeserializeOwned>(
    params: Option<Value>,
) -> Result<P, serde_json::Error> {
    match params {
        Some(value) if !value.is_null() => serde_json::from_value(value),
        _ => serde_json::from_value(Value::Null).or_else(|null_error| {
            serde_json::from_value(Value::Object(Map::new())).map_err(|_| null_error)
        }),
    }
}

pub(crate) trait ErasedRequestHandler: Send + Sync {
    fn invoke(
        self: Arc<Self>,
        method: String,
        params: Option<Value>,
        token: CancellationToken,
    ) -> BoxFuture<'static, Result<Value, DispatchError>>;
}

pub(crate) trait ErasedNotificationHandler: Send + Sync {
    fn invoke(
        self: Arc<Self>,
        method: String,
        params: Option<Value>,
    ) -> BoxFuture<'static, Result<(), DispatchError>>;
}

struct RequestAdapter<H>(H);

impl<H: RequestHandler> ErasedRequestHandler for RequestAdapter<H> {
    fn invoke(
        self: Arc<Self>,
        method: String,
        params: Option<Value>,
        token: CancellationToken,
    ) -> BoxFuture<'static, Result<Value, DispatchError>> {
        async move {
            let typed = decode_params::<H::Params>(params)
                .map_err(|error| DispatchError::invalid_params(&method, error.to_string()))?;
            let output = self
                .0
                .handle(typed, token)
                .await
                .map_err(|error| DispatchError::handler_fault(&method, error))?;
            serde_json::to_value(output).map_err(|error| {
                DispatchError::handler_fault(
                    &method,
                    HandlerError::new(format!("result could not be encoded: {error}")),
                )
            })
        }
        .boxed()
    }
}

struct NotificationAdapter<H>(H);

impl<H: NotificationHandler> ErasedNotificationHandler for NotificationAdapter<H> {
    fn invoke(
        self: Arc<Self>,
        method: String,
        params: Option<Value>,
    ) -> BoxFuture<'static, Result<(), DispatchError>> {
        async move {
            let typed = decode_params::<H::Params>(params)
                .map_err(|error| DispatchError::invalid_params(&method, error.to_string()))?;
            self.0
                .handle(typed)
                .await
                .map_err(|error| DispatchError::handler_fault(&method, error))
        }
        .boxed()
    }
}

/// Shared, type-erased handler reference.
#[derive(Clone)]
pub struct HandlerRef {
    inner: ErasedHandler,
    type_name: &'static str,
}

#[derive(Clone)]
pub(crate) enum ErasedHandler {
    Request(Arc<dyn ErasedRequestHandler>),
    Notification(Arc<dyn ErasedNotificationHandler>),
}

impl HandlerRef {
    /// Wraps a request handler.
    pub fn request<H: RequestHandler>(handler: H) -> Self {
        Self {
            inner: ErasedHandler::Request(Arc::new(RequestAdapter(handler))),
            type_name: any::type_name::<H>(),
        }
    }

    /// Wraps a notification handler.
    pub fn notification<H: NotificationHandler>(handler: H) -> Self {
        Self {
            inner: ErasedHandler::Notification(Arc::new(NotificationAdapter(handler))),
            type_name: any::type_name::<H>(),
        }
    }

    /// Returns which message kind this handler accepts.
    #[must_use]
    pub const fn kind(&self) -> MessageKind {
        match self.inner {
            ErasedHandler::Request(_) => MessageKind::Request,
            ErasedHandler::Notification(_) => MessageKind::Notification,
        }
    }

    /// Returns the handler's type name, used in diagnostics.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub(crate) const fn erased(&self) -> &ErasedHandler {
        &self.inner
    }
}

impl std::fmt::Debug for HandlerRef {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HandlerRef")
            .field("kind", &self.kind())
            .field("type_name", &self.type_name)
            .finish()
    }
}
