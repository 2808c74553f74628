//! Concrete hosts the engine can be installed into.

pub mod manual;
pub mod tokio_timers;

pub use manual::{
    ManualDialogs, ManualElementRegistry, ManualEventTarget, ManualHost, ManualObserverFactory,
    ManualPromise, Resolver, TimerKind,
};
pub use tokio_timers::TokioScheduler;
