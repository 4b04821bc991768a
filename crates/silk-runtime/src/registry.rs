//! The handler registry (C7): opcode → ordered handler chain, populated by
//! explicit registration rather than reflection (§9 Design Notes).

use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use silk_proto::{Message, Opcode};

use crate::session::SessionHandle;

/// A dispatch target for one opcode.
///
/// Implementers receive the session (to reply, fragment a MASSIVE send,
/// or disconnect) and the decoded message. Returning `Err` is fatal for
/// the session: the run loop closes it and stops.
#[async_trait]
pub trait Handler<T>: Send + Sync {
    /// Handles one message, possibly sending a reply via `session`.
    async fn handle(&self, session: &SessionHandle<T>, msg: &Message) -> Result<(), String>;
}

/// Groups related opcode handlers so they can be installed together.
///
/// `register_service` dedupes by the concrete `Service` type: registering
/// the same service type twice is a no-op, matching the source's
/// idempotent re-registration behavior without needing reflection to get
/// there.
pub trait Service<T>: 'static {
    /// The `(opcode, handler)` pairs this service installs.
    fn handlers(&self) -> Vec<(Opcode, Arc<dyn Handler<T>>)>;
}

/// Maps opcodes to an ordered list of handlers, mutated only before the
/// session's receive loop begins.
pub struct HandlerRegistry<T> {
    handlers: HashMap<Opcode, Vec<Arc<dyn Handler<T>>>>,
    registered_services: HashSet<TypeId>,
}

impl<T> Default for HandlerRegistry<T> {
    fn default() -> Self {
        Self { handlers: HashMap::new(), registered_services: HashSet::new() }
    }
}

impl<T> HandlerRegistry<T> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a standalone handler for `opcode`, appended after any
    /// handlers already registered for it.
    pub fn register_handler(&mut self, opcode: Opcode, handler: Arc<dyn Handler<T>>) {
        self.handlers.entry(opcode).or_default().push(handler);
    }

    /// Installs every `(opcode, handler)` pair a service provides.
    ///
    /// Idempotent per concrete `Service` type: calling this twice with the
    /// same `S` is a no-op the second time.
    pub fn register_service<S: Service<T>>(&mut self, service: &S) {
        if !self.registered_services.insert(TypeId::of::<S>()) {
            return;
        }
        for (opcode, handler) in service.handlers() {
            self.register_handler(opcode, handler);
        }
    }

    /// The ordered handler chain registered for `opcode`, if any.
    #[must_use]
    pub fn handlers_for(&self, opcode: Opcode) -> Option<&[Arc<dyn Handler<T>>]> {
        self.handlers.get(&opcode).map(Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopHandler;

    #[async_trait]
    impl Handler<()> for NoopHandler {
        async fn handle(&self, _session: &SessionHandle<()>, _msg: &Message) -> Result<(), String> {
            Ok(())
        }
    }

    struct Echo;
    impl Service<()> for Echo {
        fn handlers(&self) -> Vec<(Opcode, Arc<dyn Handler<()>>)> {
            vec![(0x1, Arc::new(NoopHandler))]
        }
    }

    #[test]
    fn register_handler_preserves_order() {
        let mut registry: HandlerRegistry<()> = HandlerRegistry::new();
        registry.register_handler(0x1, Arc::new(NoopHandler));
        registry.register_handler(0x1, Arc::new(NoopHandler));
        assert_eq!(registry.handlers_for(0x1).unwrap().len(), 2);
        assert!(registry.handlers_for(0x2).is_none());
    }

    #[test]
    fn register_service_is_idempotent_per_type() {
        let mut registry: HandlerRegistry<()> = HandlerRegistry::new();
        let echo = Echo;
        registry.register_service(&echo);
        registry.register_service(&echo);
        assert_eq!(registry.handlers_for(0x1).unwrap().len(), 1);
    }
}
