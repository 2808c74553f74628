//! Timers backed by a Tokio runtime.

use crate::interception::{Callback, Scheduler, TimerHandle};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::error;

/// Shortest period a repeating timer may have.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// `Scheduler` that spawns one Tokio task per registration and aborts it on
/// `clear`. Callbacks run on the runtime's worker threads.
pub struct TokioScheduler {
    runtime: Handle,
    repeating: bool,
    next: AtomicU64,
    tasks: Mutex<HashMap<TimerHandle, JoinHandle<()>>>,
}

impl TokioScheduler {
    pub fn timeout(runtime: Handle) -> Self {
        Self::new(runtime, false)
    }

    pub fn interval(runtime: Handle) -> Self {
        Self::new(runtime, true)
    }

    fn new(runtime: Handle, repeating: bool) -> Self {
        Self {
            runtime,
            repeating,
            next: AtomicU64::new(1),
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Registrations whose task has not finished or been aborted.
    pub fn active(&self) -> usize {
        self.tasks
            .lock()
            .values()
            .filter(|task| !task.is_finished())
            .count()
    }
}

fn invoke(handle: TimerHandle, callback: &mut Callback) {
    if let Err(err) = callback() {
        error!(handle = handle.as_u64(), error = %err, "Uncaught error in timer callback");
    }
}

impl Scheduler for TokioScheduler {
    fn set(&self, mut callback: Callback, delay: Duration) -> TimerHandle {
        let handle = TimerHandle::new(self.next.fetch_add(1, Ordering::Relaxed));
        let task = if self.repeating {
            let period = delay.max(MIN_PERIOD);
            self.runtime.spawn(async move {
                let start = tokio::time::Instant::now() + period;
                let mut ticker = tokio::time::interval_at(start, period);
                loop {
                    ticker.tick().await;
                    invoke(handle, &mut callback);
                }
            })
        } else {
            self.runtime.spawn(async move {
                tokio::time::sleep(delay).await;
                invoke(handle, &mut callback);
            })
        };

        let mut tasks = self.tasks.lock();
        tasks.retain(|_, task| !task.is_finished());
        tasks.insert(handle, task);
        handle
    }

    fn clear(&self, handle: TimerHandle) {
        if let Some(task) = self.tasks.lock().remove(&handle) {
            task.abort();
        }
    }

    fn repeats(&self) -> bool {
        self.repeating
    }
}
