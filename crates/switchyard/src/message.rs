//! Generic message and response envelopes.
//!
//! The transport decodes frames into [`Message`] values and encodes
//! [`ResponseEnvelope`] values back onto the wire. Parameters and results stay
//! opaque (`serde_json::Value`) at this layer; handlers receive typed values
//! through their adapters.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC error codes produced by the dispatcher.
pub mod codes {
    /// Invalid method parameters.
    pub const INVALID_PARAMS: i64 = -32602;
    /// Method does not exist or no handler accepted the message.
    pub const METHOD_NOT_FOUND: i64 = -32601;
    /// Internal dispatcher or handler failure.
    pub const INTERNAL_ERROR: i64 = -32603;
    /// The request was cancelled by the client.
    pub const REQUEST_CANCELLED: i64 = -32800;
}

/// Identifier of a request, as chosen by the client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Numeric identifier.
    Number(i64),
    /// String identifier.
    String(String),
}

impl fmt::Display for RequestId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(value) => write!(formatter, "{value}"),
            Self::String(value) => formatter.write_str(value),
        }
    }
}

impl From<i64> for RequestId {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for RequestId {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

/// Request expecting exactly one response.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Client-chosen identifier echoed in the response.
    pub id: RequestId,
    /// Protocol method name.
    pub method: String,
    /// Parameters; `None` when absent or `null`.
    pub params: Option<Value>,
}

impl Request {
    /// Builds a request.
    pub fn new(id: impl Into<RequestId>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            id: id.into(),
            method: method.into(),
            params,
        }
    }
}

/// Fire-and-forget message without a response channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    /// Protocol method name.
    pub method: String,
    /// Parameters; `None` when absent or `null`.
    pub params: Option<Value>,
}

impl Notification {
    /// Builds a notification.
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }
}

/// Decoded inbound message.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RawMessage")]
pub enum Message {
    /// A request carrying an id.
    Request(Request),
    /// A notification without an id.
    Notification(Notification),
}

impl Message {
    /// Returns the method name.
    #[must_use]
    pub fn method(&self) -> &str {
        match self {
            Self::Request(request) => &request.method,
            Self::Notification(notification) => &notification.method,
        }
    }

    /// Returns the opaque parameters.
    #[must_use]
    pub const fn params(&self) -> Option<&Value> {
        match self {
            Self::Request(request) => request.params.as_ref(),
            Self::Notification(notification) => notification.params.as_ref(),
        }
    }

    /// Returns the request id, if this is a request.
    #[must_use]
    pub const fn id(&self) -> Option<&RequestId> {
        match self {
            Self::Request(request) => Some(&request.id),
            Self::Notification(_) => None,
        }
    }

    /// Returns whether this message is a request or a notification.
    #[must_use]
    pub const fn kind(&self) -> MessageKind {
        match self {
            Self::Request(_) => MessageKind::Request,
            Self::Notification(_) => MessageKind::Notification,
        }
    }
}

impl From<Request> for Message {
    fn from(request: Request) -> Self {
        Self::Request(request)
    }
}

impl From<Notification> for Message {
    fn from(notification: Notification) -> Self {
        Self::Notification(notification)
    }
}

#[derive(Deserialize)]
struct RawMessage {
    method: String,
    #[serde(default)]
    params: Option<Value>,
    #[serde(default)]
    id: Option<RequestId>,
}

impl From<RawMessage> for Message {
    fn from(raw: RawMessage) -> Self {
        match raw.id {
            Some(id) => Self::Request(Request::new(id, raw.method, raw.params)),
            None => Self::Notification(Notification::new(raw.method, raw.params)),
        }
    }
}

/// Shape of an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Expects a response.
    Request,
    /// Never answered.
    Notification,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Request => "request",
            Self::Notification => "notification",
        })
    }
}

/// Error object carried by a failure response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseError {
    /// JSON-RPC error code.
    pub code: i64,
    /// Human-readable description.
    pub message: String,
}

impl ResponseError {
    /// Builds an error object.
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// How a request concluded.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseOutcome {
    /// The handler produced a result.
    Success(Value),
    /// Resolution or the handler failed.
    Failure(ResponseError),
    /// The request was cancelled before or during execution.
    Cancelled,
}

/// The single response produced for a routed request.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Id of the request being answered.
    pub id: RequestId,
    /// Outcome of the request.
    pub outcome: ResponseOutcome,
}

impl Response {
    /// Builds a success response.
    #[must_use]
    pub const fn success(id: RequestId, result: Value) -> Self {
        Self {
            id,
            outcome: ResponseOutcome::Success(result),
        }
    }

    /// Builds a failure response.
    #[must_use]
    pub const fn failure(id: RequestId, error: ResponseError) -> Self {
        Self {
            id,
            outcome: ResponseOutcome::Failure(error),
        }
    }

    /// Builds a cancelled response.
    #[must_use]
    pub const fn cancelled(id: RequestId) -> Self {
        Self {
            id,
            outcome: ResponseOutcome::Cancelled,
        }
    }

    /// Returns true when the request was cancelled.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self.outcome, ResponseOutcome::Cancelled)
    }

    /// Returns the result value for successful responses.
    #[must_use]
    pub const fn result(&self) -> Option<&Value> {
        match &self.outcome {
            ResponseOutcome::Success(value) => Some(value),
            ResponseOutcome::Failure(_) | ResponseOutcome::Cancelled => None,
        }
    }

    /// Returns the error object for failed responses.
    #[must_use]
    pub const fn error(&self) -> Option<&ResponseError> {
        match &self.outcome {
            ResponseOutcome::Failure(error) => Some(error),
            ResponseOutcome::Success(_) | ResponseOutcome::Cancelled => None,
        }
    }

    /// Converts the response into its wire envelope.
    ///
    /// Cancelled requests are reported with [`codes::REQUEST_CANCELLED`].
    #[must_use]
    pub fn into_envelope(self) -> ResponseEnvelope {
        let (result, error) = match self.outcome {
            ResponseOutcome::Success(value) => (Some(value), None),
            ResponseOutcome::Failure(error) => (None, Some(error)),
            ResponseOutcome::Cancelled => (
                None,
                Some(ResponseError::new(
                    codes::REQUEST_CANCELLED,
                    "request cancelled",
                )),
            ),
        };
        ResponseEnvelope {
            jsonrpc: JSONRPC_VERSION,
            id: self.id,
            result,
            error,
        }
    }
}

const JSONRPC_VERSION: &str = "2.0";

/// Serializable JSON-RPC response envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseEnvelope {
    /// Protocol version marker.
    pub jsonrpc: &'static str,
    /// Id of the request being answered.
    pub id: RequestId,
    /// Result for successful responses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error for failed or cancelled responses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ResponseError>,
}
