//! Handler registrations grouped by method name.

use std::collections::HashMap;

use tracing::debug;

use crate::handler::{HandlerRef, NotificationHandler, RequestHandler};
use crate::message::MessageKind;
use crate::scheduler::ProcessType;
use crate::selector::RegistrationOptions;

/// Tracing target for registry operations.
pub(crate) const REGISTRY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::registry");

/// A registered handler with its options and lane.
#[derive(Debug, Clone)]
pub struct HandlerDescriptor {
    method: String,
    handler: HandlerRef,
    options: RegistrationOptions,
    process_type: ProcessType,
}

impl HandlerDescriptor {
    /// Builds a descriptor.
    pub fn new(
        method: impl Into<String>,
        handler: HandlerRef,
        options: RegistrationOptions,
        process_type: ProcessType,
    ) -> Self {
        Self {
            method: method.into(),
            handler,
            options,
            process_type,
        }
    }

    /// Returns the method name.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Returns the shared handler.
    #[must_use]
    pub const fn handler(&self) -> &HandlerRef {
        &self.handler
    }

    /// Returns the registration options.
    #[must_use]
    pub const fn options(&self) -> &RegistrationOptions {
        &self.options
    }

    /// Returns the lane the handler runs on.
    #[must_use]
    pub const fn process_type(&self) -> ProcessType {
        self.process_type
    }

    /// Returns whether the handler answers requests or notifications.
    #[must_use]
    pub const fn kind(&self) -> MessageKind {
        self.handler.kind()
    }
}

/// Handlers keyed by method, each list in registration order.
#[derive(Debug, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Vec<HandlerDescriptor>>,
    methods: Vec<String>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a request handler.
    pub fn register_request<H: RequestHandler>(
        &mut self,
        method: impl Into<String>,
        handler: H,
        options: RegistrationOptions,
        process_type: ProcessType,
    ) -> &mut Self {
        self.register(HandlerDescriptor::new(
            method,
            HandlerRef::request(handler),
            options,
            process_type,
        ))
    }

    /// Registers a notification handler.
    pub fn register_notification<H: NotificationHandler>(
        &mut self,
        method: impl Into<String>,
        handler: H,
        options: RegistrationOptions,
        process_type: ProcessType,
    ) -> &mut Self {
        self.register(HandlerDescriptor::new(
            method,
            HandlerRef::notification(handler),
            options,
            process_type,
        ))
    }

    /// Appends a prebuilt descriptor.
    ///
    /// Several handlers may share a method, even with identical selectors;
    /// the matcher decides which of them run.
    pub fn register(&mut self, descriptor: HandlerDescriptor) -> &mut Self {
        let method = descriptor.method.clone();
        let handlers = self.handlers.entry(method.clone()).or_insert_with(|| {
            self.methods.push(method.clone());
            Vec::new()
        });

        let indistinguishable = handlers.iter().any(|existing| {
            existing.kind() == descriptor.kind() && existing.options == descriptor.options
        });
        if indistinguishable {
            debug!(
                target: REGISTRY_TARGET,
                %method,
                handler = descriptor.handler.type_name(),
                "handler registered with a selector identical to an earlier one"
            );
        }

        debug!(
            target: REGISTRY_TARGET,
            %method,
            handler = descriptor.handler.type_name(),
            kind = %descriptor.kind(),
            lane = %descriptor.process_type,
            "handler registered"
        );
        handlers.push(descriptor);
        self
    }

    /// Returns the handlers for `method` in registration order.
    #[must_use]
    pub fn handlers_for(&self, method: &str) -> &[HandlerDescriptor] {
        self.handlers.get(method).map_or(&[], Vec::as_slice)
    }

    /// Returns true when at least one handler is registered for `method`.
    #[must_use]
    pub fn contains(&self, method: &str) -> bool {
        self.handlers.contains_key(method)
    }

    /// Returns the registered methods in first-registration order.
    pub fn methods(&self) -> impl Iterator<Item = &str> {
        self.methods.iter().map(String::as_str)
    }

    /// Total number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.values().map(Vec::len).sum()
    }

    /// Returns true when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
