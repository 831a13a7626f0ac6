//! In-flight request tracking for cancellation.
//!
//! Every routed request owns a [`CancellationToken`] registered under its id
//! for as long as the request is in flight. A cancel notification looks the id
//! up and signals the token; unknown ids are ignored.
//!
//! Entries carry a generation so that a request finishing after its id was
//! reused never removes the newer request's entry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::message::RequestId;

/// Tracing target for cancellation bookkeeping.
pub(crate) const CANCELLATION_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::cancellation");

#[derive(Debug)]
struct Entry {
    generation: u64,
    token: CancellationToken,
}

/// A request's claim on its cancellation entry, returned by
/// [`CancellationRegistry::begin`].
#[derive(Debug, Clone)]
pub struct CancellationTicket {
    id: RequestId,
    generation: u64,
    token: CancellationToken,
}

impl CancellationTicket {
    /// Returns the request id.
    #[must_use]
    pub const fn id(&self) -> &RequestId {
        &self.id
    }

    /// Returns the token the handler observes.
    #[must_use]
    pub const fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// Map from in-flight request ids to their cancellation tokens.
#[derive(Debug, Default)]
pub struct CancellationRegistry {
    in_flight: Mutex<HashMap<RequestId, Entry>>,
    generations: AtomicU64,
}

impl CancellationRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a fresh token for `id` and returns the ticket that owns it.
    ///
    /// A duplicate id replaces the earlier entry; the earlier token can no
    /// longer be cancelled through the registry.
    #[must_use]
    pub fn begin(&self, id: RequestId) -> CancellationTicket {
        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        let entry = Entry {
            generation,
            token: token.clone(),
        };
        let replaced = self.in_flight.lock().insert(id.clone(), entry);
        if replaced.is_some() {
            warn!(
                target: CANCELLATION_TARGET,
                request_id = %id,
                "request id reused while still in flight"
            );
        }
        CancellationTicket {
            id,
            generation,
            token,
        }
    }

    /// Signals cancellation for `id` and removes it.
    ///
    /// Returns `true` when the id was in flight. Unknown ids are a no-op.
    pub fn cancel(&self, id: &RequestId) -> bool {
        let removed = self.in_flight.lock().remove(id);
        match removed {
            Some(entry) => {
                entry.token.cancel();
                debug!(target: CANCELLATION_TARGET, request_id = %id, "request cancelled");
                true
            }
            None => {
                debug!(
                    target: CANCELLATION_TARGET,
                    request_id = %id,
                    "cancel for unknown request ignored"
                );
                false
            }
        }
    }

    /// Removes the ticket's entry once its response has been produced.
    ///
    /// Does nothing when the id has since been claimed by a newer request.
    pub fn end(&self, ticket: &CancellationTicket) {
        let mut in_flight = self.in_flight.lock();
        let owned = in_flight
            .get(&ticket.id)
            .is_some_and(|entry| entry.generation == ticket.generation);
        if owned {
            in_flight.remove(&ticket.id);
        }
    }

    /// Returns true while `id` is registered.
    #[must_use]
    pub fn is_in_flight(&self, id: &RequestId) -> bool {
        self.in_flight.lock().contains_key(id)
    }

    /// Number of requests currently in flight.
    #[must_use]
    pub fn len(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// Returns true when no request is in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.in_flight.lock().is_empty()
    }
}
