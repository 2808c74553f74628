//! A deterministic host driven by hand.
//!
//! Time is virtual and only moves when the embedder calls [`ManualHost::tick`],
//! [`ManualHost::advance`] or [`ManualHost::run_until_idle`]. Callbacks run on
//! the calling thread, one at a time, in due-time order (ties in registration
//! order). Callback errors do not propagate; they are logged and collected
//! as uncaught errors, the way a browser reports them to the console.

use crate::adapters::dialogs::Dialogs;
use crate::adapters::elements::{ElementRegistry, LifecycleCallbacks, LifecycleEvent};
use crate::adapters::observer::{ObserverBackend, ObserverFactory};
use crate::adapters::registry::{HostRegistry, ANIMATION_FRAME_VARIANTS, IMMEDIATE, INTERVAL, TIMEOUT};
use crate::continuation::{OnFulfilled, OnRejected, Thenable};
use crate::interception::{Callback, EventTarget, Listener, Scheduler, TimerHandle};
use anyhow::bail;
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{trace, warn};

/// Length of one animation frame.
pub const FRAME: Duration = Duration::from_millis(16);

/// Upper bound on callbacks [`ManualHost::run_until_idle`] runs.
const MAX_IDLE_STEPS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    Timeout,
    Interval,
    Immediate,
    AnimationFrame,
}

struct Timer {
    kind: TimerKind,
    due: Duration,
    period: Duration,
    seq: u64,
    /// `None` while the callback is running.
    callback: Option<Callback>,
}

#[derive(Default)]
struct LoopState {
    now: Duration,
    next_handle: u64,
    next_seq: u64,
    timers: BTreeMap<TimerHandle, Timer>,
    uncaught: Vec<anyhow::Error>,
}

impl LoopState {
    fn seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    /// Earliest runnable timer due at or before `limit`.
    fn next_due(&self, limit: Duration, skip_intervals: bool) -> Option<TimerHandle> {
        self.timers
            .iter()
            .filter(|(_, t)| t.callback.is_some() && t.due <= limit)
            .filter(|(_, t)| !(skip_intervals && t.kind == TimerKind::Interval))
            .min_by_key(|(_, t)| (t.due, t.seq))
            .map(|(handle, _)| *handle)
    }
}

/// The event loop. Cloning yields another handle to the same loop.
#[derive(Clone, Default)]
pub struct ManualHost {
    state: Arc<Mutex<LoopState>>,
}

impl ManualHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// The raw (unpatched) scheduler for one timer family.
    pub fn scheduler(&self, kind: TimerKind) -> Arc<dyn Scheduler> {
        Arc::new(ManualScheduler {
            host: self.clone(),
            kind,
        })
    }

    /// Register every timer family and the given dialogs with `registry`.
    pub fn provide_to(&self, registry: &mut HostRegistry, dialogs: Option<Arc<dyn Dialogs>>) {
        registry
            .provide_scheduler(TIMEOUT, self.scheduler(TimerKind::Timeout))
            .provide_scheduler(INTERVAL, self.scheduler(TimerKind::Interval))
            .provide_scheduler(IMMEDIATE, self.scheduler(TimerKind::Immediate))
            .provide_scheduler(
                ANIMATION_FRAME_VARIANTS[0],
                self.scheduler(TimerKind::AnimationFrame),
            );
        if let Some(dialogs) = dialogs {
            registry.provide_dialogs(dialogs);
        }
    }

    pub fn now(&self) -> Duration {
        self.state.lock().now
    }

    /// Timers that have not fired (one-shot) or been cleared.
    pub fn scheduled(&self) -> usize {
        self.state.lock().timers.len()
    }

    fn schedule(&self, kind: TimerKind, callback: Callback, delay: Duration) -> TimerHandle {
        let mut state = self.state.lock();
        state.next_handle += 1;
        let handle = TimerHandle::new(state.next_handle);
        let (due, period) = match kind {
            TimerKind::Timeout => (state.now + delay, Duration::ZERO),
            TimerKind::Interval => {
                let period = delay.max(Duration::from_millis(1));
                (state.now + period, period)
            }
            TimerKind::Immediate => (state.now, Duration::ZERO),
            TimerKind::AnimationFrame => (state.now + FRAME, Duration::ZERO),
        };
        let seq = state.seq();
        state.timers.insert(
            handle,
            Timer {
                kind,
                due,
                period,
                seq,
                callback: Some(callback),
            },
        );
        trace!(handle = handle.as_u64(), ?kind, due_ms = due.as_millis() as u64, "timer scheduled");
        handle
    }

    fn cancel(&self, handle: TimerHandle) {
        if self.state.lock().timers.remove(&handle).is_some() {
            trace!(handle = handle.as_u64(), "timer cleared");
        }
    }

    /// Run one timer. The lock is released while the callback runs so the
    /// callback may schedule or clear timers itself.
    fn fire(&self, handle: TimerHandle) -> bool {
        let (kind, mut callback) = {
            let mut state = self.state.lock();
            let Some(timer) = state.timers.get_mut(&handle) else {
                return false;
            };
            let Some(callback) = timer.callback.take() else {
                return false;
            };
            let (kind, due) = (timer.kind, timer.due);
            if kind != TimerKind::Interval {
                state.timers.remove(&handle);
            }
            state.now = state.now.max(due);
            (kind, callback)
        };

        let result = callback();

        let mut state = self.state.lock();
        if let Err(err) = result {
            warn!(handle = handle.as_u64(), error = %err, "Uncaught error in host callback");
            state.uncaught.push(err);
        }
        if kind == TimerKind::Interval {
            let seq = state.seq();
            // Cleared while running: the entry is gone and stays gone.
            if let Some(timer) = state.timers.get_mut(&handle) {
                timer.due += timer.period;
                timer.seq = seq;
                timer.callback = Some(callback);
            }
        }
        true
    }

    /// Run every timer already due, without moving the clock. Timers the
    /// callbacks schedule for "now" wait for the next tick.
    pub fn tick(&self) -> usize {
        let batch: Vec<TimerHandle> = {
            let state = self.state.lock();
            let mut due: Vec<_> = state
                .timers
                .iter()
                .filter(|(_, t)| t.due <= state.now)
                .map(|(handle, t)| (t.due, t.seq, *handle))
                .collect();
            due.sort();
            due.into_iter().map(|(_, _, handle)| handle).collect()
        };
        batch.into_iter().filter(|handle| self.fire(*handle)).count()
    }

    /// Move the clock forward by `by`, running timers as they come due.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.now() + by;
        let mut ran = 0;
        loop {
            let next = self.state.lock().next_due(target, false);
            match next {
                Some(handle) => {
                    if self.fire(handle) {
                        ran += 1;
                    }
                }
                None => break,
            }
        }
        self.state.lock().now = target;
        ran
    }

    /// Run until nothing but intervals is scheduled, jumping the clock to
    /// each due time. Intervals keep firing while other work remains.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while ran < MAX_IDLE_STEPS {
            let next = {
                let state = self.state.lock();
                match state.next_due(Duration::MAX, true) {
                    Some(one_shot) => {
                        let limit = state.timers[&one_shot].due;
                        state.next_due(limit, false)
                    }
                    None => None,
                }
            };
            match next {
                Some(handle) => {
                    if self.fire(handle) {
                        ran += 1;
                    }
                }
                None => return ran,
            }
        }
        warn!(steps = MAX_IDLE_STEPS, "Event loop still busy, giving up");
        ran
    }

    /// Drain the uncaught callback errors collected so far.
    pub fn take_uncaught(&self) -> Vec<anyhow::Error> {
        std::mem::take(&mut self.state.lock().uncaught)
    }
}

struct ManualScheduler {
    host: ManualHost,
    kind: TimerKind,
}

impl Scheduler for ManualScheduler {
    fn set(&self, callback: Callback, delay: Duration) -> TimerHandle {
        self.host.schedule(self.kind, callback, delay)
    }

    fn clear(&self, handle: TimerHandle) {
        self.host.cancel(handle);
    }

    fn repeats(&self) -> bool {
        self.kind == TimerKind::Interval
    }
}

/// Dialogs that record what was shown and answer prompts from a queue.
#[derive(Default)]
pub struct ManualDialogs {
    alerts: Mutex<Vec<String>>,
    prompts: Mutex<Vec<String>>,
    answers: Mutex<VecDeque<Option<String>>>,
}

impl ManualDialogs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the answer for the next prompt. Without one, prompts return
    /// their default.
    pub fn answer(&self, answer: Option<String>) {
        self.answers.lock().push_back(answer);
    }

    pub fn alerts(&self) -> Vec<String> {
        self.alerts.lock().clone()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

impl Dialogs for ManualDialogs {
    fn alert(&self, message: &str) {
        self.alerts.lock().push(message.to_string());
    }

    fn prompt(&self, message: &str, default: Option<&str>) -> Option<String> {
        self.prompts.lock().push(message.to_string());
        self.answers
            .lock()
            .pop_front()
            .unwrap_or_else(|| default.map(str::to_string))
    }
}

/// In-memory event target with DOM listener semantics.
pub struct ManualEventTarget<E> {
    listeners: Mutex<Vec<(String, Listener<E>, bool)>>,
    uncaught: Mutex<Vec<anyhow::Error>>,
}

impl<E> Default for ManualEventTarget<E> {
    fn default() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
            uncaught: Mutex::new(Vec::new()),
        }
    }
}

impl<E> ManualEventTarget<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invoke every listener for `event_type`, capturing ones first.
    /// Returns how many ran.
    pub fn dispatch(&self, event_type: &str, event: &E) -> usize {
        let mut matching: Vec<(bool, Listener<E>)> = self
            .listeners
            .lock()
            .iter()
            .filter(|(t, _, _)| t == event_type)
            .map(|(_, listener, capture)| (*capture, Arc::clone(listener)))
            .collect();
        matching.sort_by_key(|(capture, _)| !*capture);

        for (_, listener) in &matching {
            if let Err(err) = listener(event) {
                warn!(event_type, error = %err, "Uncaught error in event listener");
                self.uncaught.lock().push(err);
            }
        }
        matching.len()
    }

    pub fn listener_count(&self, event_type: &str) -> usize {
        self.listeners
            .lock()
            .iter()
            .filter(|(t, _, _)| t == event_type)
            .count()
    }

    pub fn take_uncaught(&self) -> Vec<anyhow::Error> {
        std::mem::take(&mut *self.uncaught.lock())
    }
}

impl<E: 'static> EventTarget<E> for ManualEventTarget<E> {
    fn add_listener(&self, event_type: &str, listener: Listener<E>, capture: bool) {
        let mut listeners = self.listeners.lock();
        let duplicate = listeners
            .iter()
            .any(|(t, l, c)| t == event_type && Arc::ptr_eq(l, &listener) && *c == capture);
        if !duplicate {
            listeners.push((event_type.to_string(), listener, capture));
        }
    }

    fn remove_listener(&self, event_type: &str, listener: &Listener<E>, capture: bool) {
        self.listeners
            .lock()
            .retain(|(t, l, c)| !(t == event_type && Arc::ptr_eq(l, listener) && *c == capture));
    }
}

struct ObserverState<R> {
    callback: Listener<Vec<R>>,
    targets: Mutex<Vec<String>>,
    connected: AtomicBool,
}

struct ManualObserver<R> {
    state: Arc<ObserverState<R>>,
}

impl<R: Send + Sync + 'static> ObserverBackend for ManualObserver<R> {
    fn observe(&mut self, target: &str) {
        self.state.targets.lock().push(target.to_string());
        self.state.connected.store(true, Ordering::Release);
    }

    fn disconnect(&mut self) {
        self.state.targets.lock().clear();
        self.state.connected.store(false, Ordering::Release);
    }
}

/// Creates observers and delivers records to the ones watching a target.
pub struct ManualObserverFactory<R> {
    observers: Mutex<Vec<Arc<ObserverState<R>>>>,
}

impl<R> Default for ManualObserverFactory<R> {
    fn default() -> Self {
        Self {
            observers: Mutex::new(Vec::new()),
        }
    }
}

impl<R: Clone> ManualObserverFactory<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `records` to every connected observer of `target`. Returns
    /// how many observers were called.
    pub fn notify(&self, target: &str, records: Vec<R>) -> anyhow::Result<usize> {
        let observers: Vec<_> = self
            .observers
            .lock()
            .iter()
            .filter(|o| o.connected.load(Ordering::Acquire))
            .filter(|o| o.targets.lock().iter().any(|t| t == target))
            .cloned()
            .collect();
        for observer in &observers {
            (observer.callback)(&records.clone())?;
        }
        Ok(observers.len())
    }
}

impl<R: Send + Sync + 'static> ObserverFactory<R> for ManualObserverFactory<R> {
    fn create(&self, callback: Listener<Vec<R>>) -> Box<dyn ObserverBackend> {
        let state = Arc::new(ObserverState {
            callback,
            targets: Mutex::new(Vec::new()),
            connected: AtomicBool::new(false),
        });
        self.observers.lock().push(Arc::clone(&state));
        Box::new(ManualObserver { state })
    }
}

/// Element registry enforcing the custom-element naming rules.
#[derive(Default)]
pub struct ManualElementRegistry {
    definitions: Mutex<BTreeMap<String, LifecycleCallbacks>>,
}

impl ManualElementRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.definitions.lock().contains_key(name)
    }

    /// Run the lifecycle callback of `name` for `event`. Returns whether the
    /// element defined one.
    pub fn fire(&self, name: &str, event: LifecycleEvent) -> anyhow::Result<bool> {
        let callback = self
            .definitions
            .lock()
            .get(name)
            .and_then(|callbacks| callbacks.for_event(&event).cloned());
        match callback {
            Some(callback) => callback(&event).map(|()| true),
            None => Ok(false),
        }
    }
}

impl ElementRegistry for ManualElementRegistry {
    fn define(&self, name: &str, callbacks: LifecycleCallbacks) -> anyhow::Result<()> {
        if !name.contains('-') {
            bail!("'{name}' is not a valid custom element name");
        }
        let mut definitions = self.definitions.lock();
        if definitions.contains_key(name) {
            bail!("'{name}' has already been defined");
        }
        definitions.insert(name.to_string(), callbacks);
        Ok(())
    }
}

type Reaction<T> = Box<dyn FnOnce(anyhow::Result<T>) + Send>;

struct PromiseState<T> {
    result: Option<anyhow::Result<T>>,
    reaction: Option<Reaction<T>>,
}

/// Promise settled through a [`Resolver`]; continuations run as immediates
/// on the host's raw loop.
pub struct ManualPromise<T> {
    host: ManualHost,
    state: Arc<Mutex<PromiseState<T>>>,
}

/// Settles its [`ManualPromise`]. Only the first settlement counts.
pub struct Resolver<T> {
    host: ManualHost,
    state: Arc<Mutex<PromiseState<T>>>,
}

impl<T: Send + 'static> ManualPromise<T> {
    pub fn pending(host: &ManualHost) -> (Self, Resolver<T>) {
        let state = Arc::new(Mutex::new(PromiseState {
            result: None,
            reaction: None,
        }));
        let promise = Self {
            host: host.clone(),
            state: Arc::clone(&state),
        };
        let resolver = Resolver {
            host: host.clone(),
            state,
        };
        (promise, resolver)
    }

    pub fn resolved(host: &ManualHost, value: T) -> Self {
        let (promise, resolver) = Self::pending(host);
        resolver.resolve(value);
        promise
    }

    pub fn rejected(host: &ManualHost, err: anyhow::Error) -> Self {
        let (promise, resolver) = Self::pending(host);
        resolver.reject(err);
        promise
    }

    pub fn is_settled(&self) -> bool {
        self.state.lock().result.is_some()
    }

    /// Take the settled result, leaving the promise pending-looking.
    pub fn take_result(&self) -> Option<anyhow::Result<T>> {
        self.state.lock().result.take()
    }
}

impl<T: Send + 'static> Resolver<T> {
    pub fn resolve(self, value: T) {
        settle(&self.host, &self.state, Ok(value));
    }

    pub fn reject(self, err: anyhow::Error) {
        settle(&self.host, &self.state, Err(err));
    }
}

fn settle<T: Send + 'static>(
    host: &ManualHost,
    state: &Arc<Mutex<PromiseState<T>>>,
    result: anyhow::Result<T>,
) {
    let mut guard = state.lock();
    if guard.result.is_some() {
        return;
    }
    match guard.reaction.take() {
        Some(reaction) => {
            drop(guard);
            enqueue(host, reaction, result);
        }
        None => guard.result = Some(result),
    }
}

fn enqueue<T: Send + 'static>(host: &ManualHost, reaction: Reaction<T>, result: anyhow::Result<T>) {
    let mut job = Some((reaction, result));
    let callback: Callback = Box::new(move || {
        if let Some((reaction, result)) = job.take() {
            reaction(result);
        }
        Ok(())
    });
    host.schedule(TimerKind::Immediate, callback, Duration::ZERO);
}

impl<T: Send + 'static> Thenable for ManualPromise<T> {
    type Output = T;

    fn then(self, on_fulfilled: OnFulfilled<T>, on_rejected: Option<OnRejected<T>>) -> Self {
        let (next, resolver) = ManualPromise::pending(&self.host);
        let reaction: Reaction<T> = Box::new(move |result| {
            let outcome = match result {
                Ok(value) => on_fulfilled(value),
                Err(err) => match on_rejected {
                    Some(handler) => handler(err),
                    None => Err(err),
                },
            };
            match outcome {
                Ok(value) => resolver.resolve(value),
                Err(err) => resolver.reject(err),
            }
        });

        let mut state = self.state.lock();
        match state.result.take() {
            Some(result) => {
                drop(state);
                enqueue(&self.host, reaction, result);
            }
            None => state.reaction = Some(reaction),
        }
        next
    }
}
