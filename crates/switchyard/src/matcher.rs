//! Narrows a method's handlers to those that should run for a message.

use tracing::trace;

use crate::document::DocumentParams;
use crate::message::MessageKind;
use crate::registry::HandlerDescriptor;

/// Tracing target for capability matching.
pub(crate) const MATCHER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::matcher");

/// Selects handlers by comparing their document selectors with the document
/// named in a message's parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct CapabilityMatcher;

impl CapabilityMatcher {
    /// Creates a matcher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Returns the matching candidates in registration order.
    ///
    /// A sole candidate is returned without inspecting the parameters. With
    /// several candidates the message must name a document: candidates
    /// without a selector match it unconditionally, the others match when any
    /// selector filter does.
    #[must_use]
    pub fn select<'a, P>(
        &self,
        candidates: &[&'a HandlerDescriptor],
        kind: MessageKind,
        params: Option<&P>,
    ) -> Vec<&'a HandlerDescriptor>
    where
        P: DocumentParams + ?Sized,
    {
        if let [only] = candidates {
            return vec![*only];
        }

        let Some(context) = params.and_then(|value| value.document_context()) else {
            trace!(
                target: MATCHER_TARGET,
                %kind,
                candidates = candidates.len(),
                "message names no document; nothing selected"
            );
            return Vec::new();
        };

        let selected: Vec<_> = candidates
            .iter()
            .copied()
            .filter(|descriptor| {
                descriptor
                    .options()
                    .document_selector()
                    .is_none_or(|selector| selector.matches(&context))
            })
            .collect();
        trace!(
            target: MATCHER_TARGET,
            %kind,
            uri = %context.uri(),
            candidates = candidates.len(),
            selected = selected.len(),
            "capability match"
        );
        selected
    }
}
