//! Dispatch core for JSON-RPC editor-tooling servers.
//!
//! The crate sits between a transport that decodes frames into [`Message`]
//! values and the handlers that implement protocol methods. It decides which
//! handlers run for each message, runs them under the right concurrency
//! discipline and supports cancelling requests mid-flight.
//!
//! - [`Scheduler`] runs jobs on a strictly serial lane or a fully parallel
//!   lane on top of the ambient tokio runtime. Disposal never waits for
//!   outstanding work.
//! - [`HandlerRegistry`] groups handlers by method name together with their
//!   [`RegistrationOptions`] and [`ProcessType`].
//! - [`CapabilityMatcher`] narrows a method's handlers to those whose
//!   [`DocumentSelector`] accepts the document named in the parameters.
//! - [`CancellationRegistry`] maps in-flight request ids to cancellation
//!   tokens; the built-in [`CancelRequestHandler`] drives it from
//!   `$/cancelRequest` notifications.
//! - [`RequestRouter`] ties these together and produces exactly one
//!   [`Response`] for every routed request.
//!
//! Wire framing, the protocol message catalogue and process bootstrapping
//! belong to the host.

mod builtin;
mod cancellation;
mod document;
mod errors;
mod handler;
mod matcher;
mod message;
mod registry;
mod router;
mod scheduler;
mod selector;
pub mod telemetry;

pub use builtin::{
    CancelParams, CancelRequestHandler, ShutdownHandler, ShutdownSignal, methods,
};
pub use cancellation::{CancellationRegistry, CancellationTicket};
pub use document::{DocumentContext, DocumentParams, DocumentUri, DocumentUriError};
pub use errors::{DispatchError, HandlerError, JobError, SchedulerError};
pub use handler::{HandlerRef, NotificationHandler, RequestHandler};
pub use matcher::CapabilityMatcher;
pub use message::{
    Message, MessageKind, Notification, Request, RequestId, Response, ResponseEnvelope,
    ResponseError, ResponseOutcome, codes,
};
pub use registry::{HandlerDescriptor, HandlerRegistry};
pub use router::{
    PendingResponse, RequestRouter, ResolveFailure, ResolvedDispatch, ResolvedNotification,
    ResolvedRequest,
};
pub use scheduler::{ProcessType, Scheduler, SchedulerState};
pub use selector::{DocumentFilter, DocumentSelector, RegistrationOptions, SelectorError};
pub use telemetry::{TelemetryError, TelemetryHandle};
pub use tokio_util::sync::CancellationToken;

#[cfg(test)]
mod tests;
