//! Error types for scheduling, handler execution and dispatch.
//!
//! Every failure the router can observe is folded into [`DispatchError`], and
//! each variant maps to the JSON-RPC error code reported to the client. None of
//! these errors ever escapes a job: they are either turned into a response or
//! logged.

use thiserror::Error;

use crate::message::{MessageKind, ResponseError, codes};

/// Failure returned by a handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HandlerError {
    code: Option<i64>,
    message: String,
}

impl HandlerError {
    /// Builds a handler failure reported with the internal error code.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    /// Builds a handler failure reported with a specific JSON-RPC code.
    pub fn with_code(code: i64, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
        }
    }

    /// Builds an invalid-parameters failure.
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::with_code(codes::INVALID_PARAMS, message)
    }

    /// Returns the explicit code, if the handler chose one.
    #[must_use]
    pub const fn code(&self) -> Option<i64> {
        self.code
    }

    /// Returns the failure message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Failure returned by a scheduled job.
#[derive(Debug, Error)]
pub enum JobError {
    /// The job's own work failed.
    #[error("job failed: {message}")]
    Failed {
        /// Description of the failure.
        message: String,
    },
}

impl JobError {
    /// Builds a job failure.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}

/// Errors returned by [`crate::Scheduler`] lifecycle operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// `add` was called before `start`.
    #[error("scheduler has not been started")]
    NotStarted,
    /// The scheduler has been disposed.
    #[error("scheduler has been disposed")]
    Disposed,
    /// `start` was called outside a tokio runtime.
    #[error("no tokio runtime is available to drive the scheduler")]
    NoRuntime,
}

/// Errors surfaced while resolving and routing messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// No handler is registered for the method.
    #[error("method not found: {method}")]
    MethodNotFound {
        /// Method requested by the client.
        method: String,
    },

    /// Handlers exist but none accepted the message's document.
    #[error("no {kind} handler for '{method}' matches the message")]
    NoMatchingHandler {
        /// Method requested by the client.
        method: String,
        /// Whether a request or notification was being resolved.
        kind: MessageKind,
    },

    /// Parameters could not be decoded into the handler's type.
    #[error("invalid params for '{method}': {message}")]
    InvalidParams {
        /// Method being invoked.
        method: String,
        /// Decoder error.
        message: String,
    },

    /// The handler failed.
    #[error("handler for '{method}' failed: {source}")]
    HandlerFault {
        /// Method being invoked.
        method: String,
        /// Failure returned by the handler.
        #[source]
        source: HandlerError,
    },

    /// The request was cancelled.
    #[error("request for '{method}' was cancelled")]
    Cancelled {
        /// Method being invoked.
        method: String,
    },

    /// The job panicked before or while running the handler.
    #[error("job for '{method}' panicked: {message}")]
    SchedulerJobFault {
        /// Method being invoked.
        method: String,
        /// Panic payload rendered as text.
        message: String,
    },

    /// The job was dropped without producing an outcome.
    #[error("request for '{method}' was abandoned before completing")]
    Abandoned {
        /// Method being invoked.
        method: String,
    },

    /// The scheduler rejected the job.
    #[error("scheduler rejected '{method}': {source}")]
    Scheduler {
        /// Method being invoked.
        method: String,
        /// Lifecycle error.
        #[source]
        source: SchedulerError,
    },
}

impl DispatchError {
    /// Returns the JSON-RPC error code reported for this error.
    #[must_use]
    pub fn code(&self) -> i64 {
        match self {
            Self::MethodNotFound { .. } | Self::NoMatchingHandler { .. } => {
                codes::METHOD_NOT_FOUND
            }
            Self::InvalidParams { .. } => codes::INVALID_PARAMS,
            Self::HandlerFault { source, .. } => source.code().unwrap_or(codes::INTERNAL_ERROR),
            Self::Cancelled { .. } => codes::REQUEST_CANCELLED,
            Self::SchedulerJobFault { .. } | Self::Abandoned { .. } | Self::Scheduler { .. } => {
                codes::INTERNAL_ERROR
            }
        }
    }

    /// Converts the error into the error object sent to the client.
    ///
    /// Handler faults carry the handler's own message verbatim.
    #[must_use]
    pub fn to_response_error(&self) -> ResponseError {
        let message = match self {
            Self::HandlerFault { source, .. } => source.message().to_owned(),
            other => other.to_string(),
        };
        ResponseError::new(self.code(), message)
    }

    /// Creates a method-not-found error.
    pub fn method_not_found(method: impl Into<String>) -> Self {
        Self::MethodNotFound {
            method: method.into(),
        }
    }

    /// Creates a no-matching-handler error.
    pub fn no_matching_handler(method: impl Into<String>, kind: MessageKind) -> Self {
        Self::NoMatchingHandler {
            method: method.into(),
            kind,
        }
    }

    /// Creates an invalid-params error.
    pub fn invalid_params(method: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParams {
            method: method.into(),
            message: message.into(),
        }
    }

    /// Wraps a handler failure.
    pub fn handler_fault(method: impl Into<String>, source: HandlerError) -> Self {
        Self::HandlerFault {
            method: method.into(),
            source,
        }
    }

    /// Creates a cancelled error.
    pub fn cancelled(method: impl Into<String>) -> Self {
        Self::Cancelled {
            method: method.into(),
        }
    }

    /// Creates a job-fault error from a panic message.
    pub fn job_fault(method: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SchedulerJobFault {
            method: method.into(),
            message: message.into(),
        }
    }

    /// Creates an abandoned error.
    pub fn abandoned(method: impl Into<String>) -> Self {
        Self::Abandoned {
            method: method.into(),
        }
    }

    /// Wraps a scheduler rejection.
    pub fn scheduler(method: impl Into<String>, source: SchedulerError) -> Self {
        Self::Scheduler {
            method: method.into(),
            source,
        }
    }
}
