//! Generic interception patterns shared by every adapter.
//!
//! Each pattern wraps a host entry point so the callbacks handed to it are
//! bound to the zone active at registration, and keeps the owning zone's
//! pending count in step with the registration's lifetime.

use crate::error::ZoneError;
use crate::zone::{self, Zone, ZoneSpec};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub mod listener;
pub mod scheduling;
pub mod slot;

pub use listener::{EventTarget, ZonedEventTarget};
pub use scheduling::{Scheduler, TimerHandle, ZonedScheduler};
pub use slot::{EventSlots, PropertySlot};

/// A host-invoked callback. Errors surface however the host reports them.
pub type Callback = Box<dyn FnMut() -> anyhow::Result<()> + Send>;

/// A host-invoked listener, compared by `Arc` identity.
pub type Listener<E> = Arc<dyn Fn(&E) -> anyhow::Result<()> + Send + Sync>;

/// Which zone a bound callback runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindMode {
    /// The zone active at registration.
    #[default]
    Capture,
    /// A fresh child of the registering zone per callback (the root binds
    /// directly).
    ForkPerTask,
}

impl BindMode {
    pub(crate) fn task_zone(self, owner: &Arc<Zone>) -> Arc<Zone> {
        match self {
            BindMode::ForkPerTask if !owner.is_root() => owner.fork(ZoneSpec::new()),
            _ => Arc::clone(owner),
        }
    }
}

/// Collapse a run outcome into what a host callback reports.
///
/// A failure consumed by `on_error` is not reported again.
pub(crate) fn host_result<T>(result: Result<Option<T>, ZoneError>) -> anyhow::Result<()> {
    result.map(|_| ()).map_err(anyhow::Error::from)
}

pub(crate) fn bind_callback(zone: Arc<Zone>, mut callback: Callback) -> Callback {
    Box::new(move || host_result(zone.run(|| callback())))
}

pub(crate) fn bind_listener<E: 'static>(zone: Arc<Zone>, listener: Listener<E>) -> Listener<E> {
    Arc::new(move |event: &E| host_result(zone.run(|| listener(event))))
}

/// Bind a listener to the active zone using `mode`.
pub fn bind_listener_with<E: 'static>(mode: BindMode, listener: Listener<E>) -> Listener<E> {
    bind_listener(mode.task_zone(&zone::current()), listener)
}
