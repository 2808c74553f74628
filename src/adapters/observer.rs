//! Observer classes (mutation observers and the like): the callback is
//! handed over once, at construction.

use crate::interception::{bind_listener, BindMode, Listener};
use crate::zone::{self, PendingTask, Zone};
use std::sync::Arc;
use tracing::trace;

/// A host observer instance.
pub trait ObserverBackend: Send {
    fn observe(&mut self, target: &str);
    fn disconnect(&mut self);
}

/// Host constructor for observers delivering batches of `R`.
pub trait ObserverFactory<R>: Send + Sync {
    fn create(&self, callback: Listener<Vec<R>>) -> Box<dyn ObserverBackend>;
}

/// Observer whose callback is bound to its creation zone.
///
/// While observing, the creation zone holds one pending task; `disconnect`
/// (or dropping the observer) settles it.
pub struct ZonedObserver {
    backend: Box<dyn ObserverBackend>,
    creation_zone: Arc<Zone>,
    zoned: bool,
    active: Option<PendingTask>,
}

impl ZonedObserver {
    pub fn new<R: 'static>(factory: &dyn ObserverFactory<R>, callback: Listener<Vec<R>>) -> Self {
        Self::with_bind_mode(factory, callback, BindMode::default())
    }

    pub fn with_bind_mode<R: 'static>(
        factory: &dyn ObserverFactory<R>,
        callback: Listener<Vec<R>>,
        mode: BindMode,
    ) -> Self {
        let creation_zone = zone::current();
        let bound = bind_listener(mode.task_zone(&creation_zone), callback);
        Self {
            backend: factory.create(bound),
            creation_zone,
            zoned: true,
            active: None,
        }
    }

    /// Hand the callback to the factory unbound; observing is not counted.
    pub fn passthrough<R: 'static>(factory: &dyn ObserverFactory<R>, callback: Listener<Vec<R>>) -> Self {
        Self {
            backend: factory.create(callback),
            creation_zone: zone::current(),
            zoned: false,
            active: None,
        }
    }

    pub fn observe(&mut self, target: &str) {
        self.backend.observe(target);
        if self.zoned && self.active.is_none() {
            trace!(zone = %self.creation_zone.id(), target, "observer activated");
            self.active = Some(PendingTask::register(&self.creation_zone));
        }
    }

    pub fn disconnect(&mut self) {
        self.backend.disconnect();
        if self.active.take().is_some() {
            trace!(zone = %self.creation_zone.id(), "observer disconnected");
        }
    }

    pub fn is_observing(&self) -> bool {
        self.active.is_some()
    }

    pub fn creation_zone(&self) -> &Arc<Zone> {
        &self.creation_zone
    }
}
