//! Scheduling-pair pattern: "set a pending callback" plus "clear it by handle".

use crate::interception::{bind_callback, BindMode, Callback};
use crate::zone::{self, PendingTask};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::trace;

/// Host-issued handle for a scheduled callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerHandle(u64);

impl TimerHandle {
    pub fn new(raw: u64) -> Self {
        TimerHandle(raw)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// A host entry point that runs callbacks later.
pub trait Scheduler: Send + Sync {
    fn set(&self, callback: Callback, delay: Duration) -> TimerHandle;

    /// Cancel a callback that has not fired (or stop a repeating one).
    /// Unknown handles are ignored.
    fn clear(&self, handle: TimerHandle);

    /// Whether callbacks fire repeatedly until cleared.
    fn repeats(&self) -> bool {
        false
    }
}

/// Zone-aware replacement for a host scheduler.
///
/// `set` binds the callback to the registering zone and registers a pending
/// task there. A one-shot callback settles it once it has run, whether it
/// returned, failed or panicked; `clear` settles it without running the
/// callback.
///
/// The callback handed to the host owns the task. The side table only holds
/// a weak reference, so a zone is released as soon as the host drops its
/// last callback.
pub struct ZonedScheduler {
    name: String,
    inner: Arc<dyn Scheduler>,
    mode: BindMode,
    pending: Mutex<HashMap<TimerHandle, Weak<PendingTask>>>,
}

/// Settles a one-shot task on every exit from its callback, unwinding
/// included.
struct SettleOnExit<'a>(&'a PendingTask);

impl Drop for SettleOnExit<'_> {
    fn drop(&mut self) {
        self.0.complete();
    }
}

fn is_live(task: &Weak<PendingTask>) -> bool {
    task.upgrade().is_some_and(|task| !task.is_settled())
}

impl ZonedScheduler {
    pub fn new(name: impl Into<String>, inner: Arc<dyn Scheduler>) -> Self {
        Self {
            name: name.into(),
            inner,
            mode: BindMode::default(),
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_bind_mode(mut self, mode: BindMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The unpatched host scheduler.
    pub fn original(&self) -> &Arc<dyn Scheduler> {
        &self.inner
    }

    /// Registrations that have neither fired (one-shot) nor been cleared.
    pub fn outstanding(&self) -> usize {
        self.pending.lock().values().filter(|task| is_live(task)).count()
    }
}

impl Scheduler for ZonedScheduler {
    fn set(&self, callback: Callback, delay: Duration) -> TimerHandle {
        let owner = zone::current();
        let task = Arc::new(PendingTask::register(&owner));
        let repeats = self.inner.repeats();

        let mut bound = bind_callback(self.mode.task_zone(&owner), callback);
        let weak = Arc::downgrade(&task);
        let wrapped: Callback = Box::new(move || {
            let _settle = (!repeats).then(|| SettleOnExit(&task));
            bound()
        });

        let handle = self.inner.set(wrapped, delay);
        trace!(
            entry_point = %self.name,
            zone = %owner.id(),
            handle = handle.as_u64(),
            "callback scheduled"
        );

        let mut pending = self.pending.lock();
        pending.retain(|_, task| is_live(task));
        pending.insert(handle, weak);
        handle
    }

    fn clear(&self, handle: TimerHandle) {
        self.inner.clear(handle);
        let task = self.pending.lock().remove(&handle);
        if let Some(task) = task.and_then(|task| task.upgrade()) {
            if task.complete() {
                trace!(
                    entry_point = %self.name,
                    zone = %task.zone().id(),
                    handle = handle.as_u64(),
                    "callback cleared before settling"
                );
            }
        }
    }

    fn repeats(&self) -> bool {
        self.inner.repeats()
    }
}
