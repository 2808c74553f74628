//! WebSocket-style objects: a listener registry plus `on*` handler slots.

use crate::error::EngineError;
use crate::interception::{BindMode, EventSlots, EventTarget, Listener, ZonedEventTarget};
use std::sync::Arc;

/// Handler slots every socket carries
pub const SOCKET_HANDLERS: [&str; 4] = ["onopen", "onmessage", "onclose", "onerror"];

pub struct ZonedSocket<E> {
    events: ZonedEventTarget<E>,
    slots: EventSlots<E>,
}

impl<E: 'static> ZonedSocket<E> {
    pub fn new(target: Arc<dyn EventTarget<E>>) -> Self {
        Self::with_bind_mode(target, BindMode::default())
    }

    pub fn with_bind_mode(target: Arc<dyn EventTarget<E>>, mode: BindMode) -> Self {
        Self {
            events: ZonedEventTarget::new(target).with_bind_mode(mode),
            slots: EventSlots::with_bind_mode(SOCKET_HANDLERS, mode),
        }
    }

    /// `addEventListener`/`removeEventListener` surface.
    /// A socket whose listeners and handlers reach the host unbound.
    pub fn passthrough(target: Arc<dyn EventTarget<E>>) -> Self {
        Self {
            events: ZonedEventTarget::new(target).passthrough(),
            slots: EventSlots::new(SOCKET_HANDLERS).passthrough(),
        }
    }

    pub fn events(&self) -> &ZonedEventTarget<E> {
        &self.events
    }

    pub fn slots(&self) -> &EventSlots<E> {
        &self.slots
    }

    pub fn set_handler(&self, name: &str, handler: Option<Listener<E>>) -> Result<(), EngineError> {
        self.slots.set(name, handler)
    }

    pub fn handler(&self, name: &str) -> Option<Listener<E>> {
        self.slots.get(name)
    }

    /// Deliver an event of `event_type` (`"message"`, `"close"`, ...) to the
    /// matching `on*` handler. Listeners added through [`Self::events`] live
    /// on the host target and are dispatched by the host.
    pub fn deliver(&self, event_type: &str, event: &E) -> anyhow::Result<bool> {
        self.slots.dispatch(&format!("on{event_type}"), event)
    }
}
