//! Custom-element registration: lifecycle callbacks are bound when the
//! element is defined.

use crate::interception::{bind_listener, BindMode, Listener};
use crate::zone;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    Created {
        element: String,
    },
    Attached {
        element: String,
    },
    Detached {
        element: String,
    },
    AttributeChanged {
        element: String,
        name: String,
        old: Option<String>,
        new: Option<String>,
    },
}

#[derive(Clone, Default)]
pub struct LifecycleCallbacks {
    pub created: Option<Listener<LifecycleEvent>>,
    pub attached: Option<Listener<LifecycleEvent>>,
    pub detached: Option<Listener<LifecycleEvent>>,
    pub attribute_changed: Option<Listener<LifecycleEvent>>,
}

impl LifecycleCallbacks {
    /// Apply `f` to every callback that is present.
    pub fn map(self, mut f: impl FnMut(Listener<LifecycleEvent>) -> Listener<LifecycleEvent>) -> Self {
        Self {
            created: self.created.map(&mut f),
            attached: self.attached.map(&mut f),
            detached: self.detached.map(&mut f),
            attribute_changed: self.attribute_changed.map(&mut f),
        }
    }

    /// The callback responsible for `event`.
    pub fn for_event(&self, event: &LifecycleEvent) -> Option<&Listener<LifecycleEvent>> {
        match event {
            LifecycleEvent::Created { .. } => self.created.as_ref(),
            LifecycleEvent::Attached { .. } => self.attached.as_ref(),
            LifecycleEvent::Detached { .. } => self.detached.as_ref(),
            LifecycleEvent::AttributeChanged { .. } => self.attribute_changed.as_ref(),
        }
    }
}

/// Host registry of element definitions. Rejections are the host's own.
pub trait ElementRegistry: Send + Sync {
    fn define(&self, name: &str, callbacks: LifecycleCallbacks) -> anyhow::Result<()>;
}

pub struct ZonedElementRegistry {
    inner: Arc<dyn ElementRegistry>,
    mode: BindMode,
}

impl ZonedElementRegistry {
    pub fn new(inner: Arc<dyn ElementRegistry>) -> Self {
        Self {
            inner,
            mode: BindMode::default(),
        }
    }

    pub fn with_bind_mode(mut self, mode: BindMode) -> Self {
        self.mode = mode;
        self
    }
}

impl ElementRegistry for ZonedElementRegistry {
    fn define(&self, name: &str, callbacks: LifecycleCallbacks) -> anyhow::Result<()> {
        let zone = self.mode.task_zone(&zone::current());
        debug!(element = name, zone = %zone.id(), "binding element lifecycle callbacks");
        let bound = callbacks.map(|callback| bind_listener(Arc::clone(&zone), callback));
        self.inner.define(name, bound)
    }
}
