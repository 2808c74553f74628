//! Single-slot property pattern: "on-event" properties holding one callback.

use crate::error::EngineError;
use crate::interception::{bind_listener, BindMode, Listener};
use crate::zone::{self, PendingTask};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::trace;

struct SlotEntry<E> {
    original: Listener<E>,
    bound: Listener<E>,
    _task: Option<PendingTask>,
}

/// One callback slot. Assigned callbacks are bound to the assigning zone;
/// reading the slot returns exactly what was assigned.
pub struct PropertySlot<E> {
    name: String,
    mode: BindMode,
    passthrough: bool,
    entry: Mutex<Option<SlotEntry<E>>>,
}

impl<E: 'static> PropertySlot<E> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mode: BindMode::default(),
            passthrough: false,
            entry: Mutex::new(None),
        }
    }

    pub fn with_bind_mode(mut self, mode: BindMode) -> Self {
        self.mode = mode;
        self
    }

    /// Store callbacks unbound and uncounted, for a disabled entry point.
    pub fn passthrough(mut self) -> Self {
        self.passthrough = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Assign or clear the slot. A replaced callback's registration settles.
    pub fn set(&self, listener: Option<Listener<E>>) {
        let entry = listener.map(|original| {
            if self.passthrough {
                return SlotEntry {
                    bound: Arc::clone(&original),
                    original,
                    _task: None,
                };
            }
            let owner = zone::current();
            trace!(slot = %self.name, zone = %owner.id(), "slot assigned");
            SlotEntry {
                bound: bind_listener(self.mode.task_zone(&owner), Arc::clone(&original)),
                original,
                _task: Some(PendingTask::register(&owner)),
            }
        });
        let previous = std::mem::replace(&mut *self.entry.lock(), entry);
        drop(previous);
    }

    /// The callback as it was assigned, not the bound wrapper.
    pub fn get(&self) -> Option<Listener<E>> {
        self.entry
            .lock()
            .as_ref()
            .map(|entry| Arc::clone(&entry.original))
    }

    pub fn is_set(&self) -> bool {
        self.entry.lock().is_some()
    }

    /// Invoke the slot's callback as the host would. Returns whether one was set.
    pub fn dispatch(&self, event: &E) -> anyhow::Result<bool> {
        let bound = self
            .entry
            .lock()
            .as_ref()
            .map(|entry| Arc::clone(&entry.bound));
        match bound {
            Some(bound) => bound(event).map(|()| true),
            None => Ok(false),
        }
    }
}

/// A fixed group of named slots, such as an element's `onload`/`onerror`.
pub struct EventSlots<E> {
    slots: BTreeMap<String, PropertySlot<E>>,
}

impl<E: 'static> EventSlots<E> {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_bind_mode(names, BindMode::default())
    }

    pub fn with_bind_mode<I, S>(names: I, mode: BindMode) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let slots = names
            .into_iter()
            .map(|name| {
                let name = name.into();
                (name.clone(), PropertySlot::new(name).with_bind_mode(mode))
            })
            .collect();
        Self { slots }
    }

    pub fn passthrough(self) -> Self {
        let slots = self
            .slots
            .into_iter()
            .map(|(name, slot)| (name, slot.passthrough()))
            .collect();
        Self { slots }
    }

    pub fn slot(&self, name: &str) -> Option<&PropertySlot<E>> {
        self.slots.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(String::as_str)
    }

    pub fn set(&self, name: &str, listener: Option<Listener<E>>) -> Result<(), EngineError> {
        self.slot(name)
            .ok_or_else(|| EngineError::InvalidEntryPoint(name.to_string()))?
            .set(listener);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Listener<E>> {
        self.slot(name).and_then(PropertySlot::get)
    }

    /// Dispatch to the slot named `name`; unknown or empty slots are a no-op.
    pub fn dispatch(&self, name: &str, event: &E) -> anyhow::Result<bool> {
        match self.slot(name) {
            Some(slot) => slot.dispatch(event),
            None => Ok(false),
        }
    }
}
