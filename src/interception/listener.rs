//! Listener-registry pattern: subscribe/unsubscribe by listener identity.

use crate::interception::{bind_listener, BindMode, Listener};
use crate::zone::{self, PendingTask};
use parking_lot::Mutex;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// A host object that dispatches events of type `E` to listeners.
///
/// `remove_listener` matches on `Arc` identity, like the DOM matches on
/// function identity.
pub trait EventTarget<E>: Send + Sync {
    fn add_listener(&self, event_type: &str, listener: Listener<E>, capture: bool);
    fn remove_listener(&self, event_type: &str, listener: &Listener<E>, capture: bool);
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ListenerKey {
    event_type: String,
    listener: usize,
    capture: bool,
}

impl ListenerKey {
    fn new<E>(event_type: &str, listener: &Listener<E>, capture: bool) -> Self {
        Self {
            event_type: event_type.to_string(),
            listener: Arc::as_ptr(listener).cast::<()>() as usize,
            capture,
        }
    }
}

struct Registration<E> {
    // Keeps the address in the key from being reused while registered.
    _original: Listener<E>,
    bound: Listener<E>,
    _task: PendingTask,
}

/// Zone-aware wrapper around a host event target.
///
/// Listeners are bound at subscription time; the side table maps the
/// caller's original listener to the bound wrapper the host actually holds,
/// so unsubscribing with the original works.
pub struct ZonedEventTarget<E> {
    inner: Arc<dyn EventTarget<E>>,
    mode: BindMode,
    passthrough: bool,
    registry: Mutex<HashMap<ListenerKey, Registration<E>>>,
}

impl<E: 'static> ZonedEventTarget<E> {
    pub fn new(inner: Arc<dyn EventTarget<E>>) -> Self {
        Self {
            inner,
            mode: BindMode::default(),
            passthrough: false,
            registry: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_bind_mode(mut self, mode: BindMode) -> Self {
        self.mode = mode;
        self
    }

    /// Hand listeners to the host untouched and uncounted, for a disabled
    /// entry point.
    pub fn passthrough(mut self) -> Self {
        self.passthrough = true;
        self
    }

    pub fn original(&self) -> &Arc<dyn EventTarget<E>> {
        &self.inner
    }

    pub fn listener_count(&self) -> usize {
        self.registry.lock().len()
    }
}

impl<E: 'static> EventTarget<E> for ZonedEventTarget<E> {
    fn add_listener(&self, event_type: &str, listener: Listener<E>, capture: bool) {
        if self.passthrough {
            self.inner.add_listener(event_type, listener, capture);
            return;
        }
        let key = ListenerKey::new(event_type, &listener, capture);
        if self.registry.lock().contains_key(&key) {
            trace!(event_type, capture, "duplicate listener ignored");
            return;
        }

        // Forking runs `on_zone_created`, which may call back into this target.
        let owner = zone::current();
        let bound = bind_listener(self.mode.task_zone(&owner), Arc::clone(&listener));

        match self.registry.lock().entry(key) {
            Entry::Occupied(_) => {
                trace!(event_type, capture, "duplicate listener ignored");
                return;
            }
            Entry::Vacant(slot) => {
                slot.insert(Registration {
                    _original: listener,
                    bound: Arc::clone(&bound),
                    _task: PendingTask::register(&owner),
                });
            }
        }
        trace!(event_type, capture, zone = %owner.id(), "listener bound");
        self.inner.add_listener(event_type, bound, capture);
    }

    fn remove_listener(&self, event_type: &str, listener: &Listener<E>, capture: bool) {
        let key = ListenerKey::new(event_type, listener, capture);
        let removed = self.registry.lock().remove(&key);
        match removed {
            Some(registration) => {
                self.inner
                    .remove_listener(event_type, &registration.bound, capture);
                trace!(event_type, capture, "listener removed");
            }
            // Not registered through this wrapper; let the host decide.
            None => self.inner.remove_listener(event_type, listener, capture),
        }
    }
}
