//! Adapters: per-family glue between host entry points and the
//! interception patterns.
//!
//! Scheduler and dialog entry points are host-global and are patched once
//! through [`HostRegistry::apply`]. Event targets, slots, observers, element
//! registries and sockets are per-instance: the registry wraps them where
//! they are created (`HostRegistry::event_target`, `HostRegistry::socket`,
//! ...) using its bind mode, and leaves them unwrapped when their entry
//! point is disabled.

pub mod dialogs;
pub mod elements;
pub mod frames;
pub mod observer;
pub mod registry;
pub mod socket;
pub mod timers;

/// Event targets use the listener-registry wrapper as is.
pub mod events {
    pub use crate::interception::listener::{EventTarget, ZonedEventTarget};
}

pub use dialogs::{Dialogs, ZonedDialogs};
pub use elements::{ElementRegistry, LifecycleCallbacks, LifecycleEvent, ZonedElementRegistry};
pub use frames::AnimationFrames;
pub use observer::{ObserverBackend, ObserverFactory, ZonedObserver};
pub use registry::{ApplyReport, EntryPoint, HostRegistry, InterceptionTable, Strategy};
pub use socket::{ZonedSocket, SOCKET_HANDLERS};
pub use timers::Timers;
