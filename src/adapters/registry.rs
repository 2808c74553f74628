//! The registration table and the host registry it is applied to.

use crate::adapters::dialogs::{Dialogs, ZonedDialogs};
use crate::adapters::elements::{ElementRegistry, ZonedElementRegistry};
use crate::adapters::observer::{ObserverFactory, ZonedObserver};
use crate::adapters::socket::ZonedSocket;
use crate::continuation::{Thenable, ZonedThenable};
use crate::error::EngineError;
use crate::interception::{
    BindMode, EventSlots, EventTarget, Listener, Scheduler, ZonedEventTarget, ZonedScheduler,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info};

pub const TIMEOUT: &str = "setTimeout";
pub const INTERVAL: &str = "setInterval";
pub const IMMEDIATE: &str = "setImmediate";
pub const ALERT: &str = "alert";
pub const PROMPT: &str = "prompt";
pub const EVENT_TARGET: &str = "EventTarget";
pub const ON_EVENT_PROPERTIES: &str = "on-event properties";
pub const PROMISE: &str = "Promise";
pub const REGISTER_ELEMENT: &str = "registerElement";
pub const WEB_SOCKET: &str = "WebSocket";
pub const MUTATION_OBSERVER_VARIANTS: [&str; 2] = ["MutationObserver", "WebKitMutationObserver"];

/// Animation-frame entry points, in order of preference.
pub const ANIMATION_FRAME_VARIANTS: [&str; 3] = [
    "requestAnimationFrame",
    "mozRequestAnimationFrame",
    "webkitRequestAnimationFrame",
];

/// How an entry point is intercepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// set + clear by handle
    SchedulingPair,
    /// set only
    SchedulingSet,
    /// The whole function is replaced
    Override,
    ListenerRegistry,
    SingleSlot,
    /// Callback handed over once, when the object is constructed
    ConstructorBind,
    Continuation,
}

impl Strategy {
    /// Host-global strategies are patched by [`HostRegistry::apply`]; the
    /// rest wrap objects where they are created.
    pub fn is_global(self) -> bool {
        matches!(
            self,
            Strategy::SchedulingPair | Strategy::SchedulingSet | Strategy::Override
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPoint {
    pub name: String,
    pub strategy: Strategy,
}

impl EntryPoint {
    pub fn new(name: impl Into<String>, strategy: Strategy) -> Self {
        Self {
            name: name.into(),
            strategy,
        }
    }
}

/// Entry points to intercept, in installation order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterceptionTable {
    entries: Vec<EntryPoint>,
}

impl InterceptionTable {
    /// Every entry point a browser-like host may provide.
    pub fn browser() -> Self {
        let mut entries = vec![
            EntryPoint::new(TIMEOUT, Strategy::SchedulingPair),
            EntryPoint::new(INTERVAL, Strategy::SchedulingPair),
            EntryPoint::new(IMMEDIATE, Strategy::SchedulingPair),
        ];
        entries.extend(
            ANIMATION_FRAME_VARIANTS
                .iter()
                .map(|name| EntryPoint::new(*name, Strategy::SchedulingSet)),
        );
        entries.extend([
            EntryPoint::new(ALERT, Strategy::Override),
            EntryPoint::new(PROMPT, Strategy::Override),
            EntryPoint::new(EVENT_TARGET, Strategy::ListenerRegistry),
            EntryPoint::new(ON_EVENT_PROPERTIES, Strategy::SingleSlot),
            EntryPoint::new(PROMISE, Strategy::Continuation),
        ]);
        entries.extend(
            MUTATION_OBSERVER_VARIANTS
                .iter()
                .map(|name| EntryPoint::new(*name, Strategy::ConstructorBind)),
        );
        entries.extend([
            EntryPoint::new(REGISTER_ELEMENT, Strategy::ConstructorBind),
            EntryPoint::new(WEB_SOCKET, Strategy::ListenerRegistry),
        ]);
        Self { entries }
    }

    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// This table minus the named entries. Unknown names are an error so a
    /// typo in configuration does not silently leave an entry enabled.
    pub fn without<S: AsRef<str>>(mut self, disabled: &[S]) -> Result<Self, EngineError> {
        for name in disabled {
            let name = name.as_ref();
            if !self.is_known(name) {
                return Err(EngineError::InvalidEntryPoint(name.to_string()));
            }
            self.entries.retain(|entry| entry.name != name);
        }
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&EntryPoint> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    pub fn is_known(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn entries(&self) -> &[EntryPoint] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for InterceptionTable {
    fn default() -> Self {
        Self::browser()
    }
}

/// What [`HostRegistry::apply`] did with each table entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    /// Global entry points now replaced by their zoned version
    pub patched: Vec<String>,
    /// Entry points the host does not provide
    pub skipped: Vec<String>,
    /// Entry points wrapped per object, using the registry's bind mode
    pub per_instance: Vec<String>,
}

/// The host's global entry points, keyed by name.
///
/// Keeps the original of every entry point so the unpatched behaviour stays
/// reachable after [`HostRegistry::apply`].
#[derive(Default)]
pub struct HostRegistry {
    schedulers: BTreeMap<String, Arc<dyn Scheduler>>,
    dialogs: Option<Arc<dyn Dialogs>>,
    patched_schedulers: BTreeMap<String, Arc<ZonedScheduler>>,
    patched_dialogs: Option<Arc<ZonedDialogs>>,
    enabled: BTreeSet<String>,
    bind_mode: BindMode,
    applied: bool,
}

impl HostRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provide_scheduler(&mut self, name: impl Into<String>, scheduler: Arc<dyn Scheduler>) -> &mut Self {
        self.schedulers.insert(name.into(), scheduler);
        self
    }

    pub fn provide_dialogs(&mut self, dialogs: Arc<dyn Dialogs>) -> &mut Self {
        self.dialogs = Some(dialogs);
        self
    }

    /// Install the zoned replacement of every table entry the host provides.
    pub fn apply(&mut self, table: &InterceptionTable, mode: BindMode) -> Result<ApplyReport, EngineError> {
        if self.applied {
            return Err(EngineError::AlreadyApplied);
        }

        let mut report = ApplyReport::default();
        let mut route_alert = false;
        let mut patch_dialogs = false;

        for entry in table.entries() {
            let name = entry.name.clone();
            let provided = match entry.strategy {
                Strategy::SchedulingPair | Strategy::SchedulingSet => {
                    match self.schedulers.get(&name) {
                        Some(original) => {
                            let zoned = ZonedScheduler::new(name.clone(), Arc::clone(original))
                                .with_bind_mode(mode);
                            self.patched_schedulers.insert(name.clone(), Arc::new(zoned));
                            true
                        }
                        None => false,
                    }
                }
                Strategy::Override => {
                    let provided = self.dialogs.is_some();
                    if provided {
                        patch_dialogs = true;
                        route_alert |= name == ALERT;
                    }
                    provided
                }
                _ => {
                    debug!(entry_point = %name, strategy = ?entry.strategy, "entry point wrapped per instance");
                    self.enabled.insert(name.clone());
                    report.per_instance.push(name);
                    continue;
                }
            };

            if provided {
                debug!(entry_point = %name, strategy = ?entry.strategy, "entry point patched");
                self.enabled.insert(name.clone());
                report.patched.push(name);
            } else {
                debug!(entry_point = %name, "host does not provide entry point, skipping");
                report.skipped.push(name);
            }
        }

        if patch_dialogs {
            if let Some(original) = &self.dialogs {
                let zoned = ZonedDialogs::new(Arc::clone(original));
                self.patched_dialogs = Some(Arc::new(if route_alert {
                    zoned
                } else {
                    zoned.without_alert_routing()
                }));
            }
        }

        self.bind_mode = mode;
        self.applied = true;
        info!(
            patched = report.patched.len(),
            skipped = report.skipped.len(),
            per_instance = report.per_instance.len(),
            bind_mode = ?mode,
            "Interception table applied"
        );
        Ok(report)
    }

    /// The entry point as the application should call it: the zoned version
    /// once applied, otherwise the host's own.
    pub fn scheduler(&self, name: &str) -> Option<Arc<dyn Scheduler>> {
        match self.patched_schedulers.get(name) {
            Some(zoned) => Some(Arc::clone(zoned) as Arc<dyn Scheduler>),
            None => self.original_scheduler(name),
        }
    }

    /// The zoned wrapper itself, for inspecting outstanding registrations.
    pub fn zoned_scheduler(&self, name: &str) -> Option<&Arc<ZonedScheduler>> {
        self.patched_schedulers.get(name)
    }

    pub fn original_scheduler(&self, name: &str) -> Option<Arc<dyn Scheduler>> {
        self.schedulers.get(name).cloned()
    }

    pub fn dialogs(&self) -> Option<Arc<dyn Dialogs>> {
        match &self.patched_dialogs {
            Some(zoned) => Some(Arc::clone(zoned) as Arc<dyn Dialogs>),
            None => self.original_dialogs(),
        }
    }

    pub fn original_dialogs(&self) -> Option<Arc<dyn Dialogs>> {
        self.dialogs.clone()
    }

    /// Bind mode per-instance wrappers should use.
    pub fn bind_mode(&self) -> BindMode {
        self.bind_mode
    }

    pub fn is_applied(&self) -> bool {
        self.applied
    }

    /// Whether `name` was patched or marked for per-instance wrapping.
    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled.contains(name)
    }

    // Per-instance wrappers. A disabled entry point, or a registry not yet
    // applied, hands callbacks to the host untouched.

    pub fn event_target<E: 'static>(&self, inner: Arc<dyn EventTarget<E>>) -> Arc<dyn EventTarget<E>> {
        if self.is_enabled(EVENT_TARGET) {
            Arc::new(ZonedEventTarget::new(inner).with_bind_mode(self.bind_mode))
        } else {
            inner
        }
    }

    /// A group of on-event property slots named `names`.
    pub fn event_slots<E, I, S>(&self, names: I) -> EventSlots<E>
    where
        E: 'static,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let slots = EventSlots::with_bind_mode(names, self.bind_mode);
        if self.is_enabled(ON_EVENT_PROPERTIES) {
            slots
        } else {
            slots.passthrough()
        }
    }

    pub fn thenable<P: Thenable>(&self, inner: P) -> ZonedThenable<P> {
        if self.is_enabled(PROMISE) {
            ZonedThenable::new(inner)
        } else {
            ZonedThenable::passthrough(inner)
        }
    }

    /// Construct an observer through the entry point `name`, one of
    /// [`MUTATION_OBSERVER_VARIANTS`].
    pub fn observer<R: 'static>(
        &self,
        name: &str,
        factory: &dyn ObserverFactory<R>,
        callback: Listener<Vec<R>>,
    ) -> Result<ZonedObserver, EngineError> {
        if !MUTATION_OBSERVER_VARIANTS.contains(&name) {
            return Err(EngineError::InvalidEntryPoint(name.to_string()));
        }
        Ok(if self.is_enabled(name) {
            ZonedObserver::with_bind_mode(factory, callback, self.bind_mode)
        } else {
            ZonedObserver::passthrough(factory, callback)
        })
    }

    pub fn element_registry(&self, inner: Arc<dyn ElementRegistry>) -> Arc<dyn ElementRegistry> {
        if self.is_enabled(REGISTER_ELEMENT) {
            Arc::new(ZonedElementRegistry::new(inner).with_bind_mode(self.bind_mode))
        } else {
            inner
        }
    }

    pub fn socket<E: 'static>(&self, target: Arc<dyn EventTarget<E>>) -> ZonedSocket<E> {
        if self.is_enabled(WEB_SOCKET) {
            ZonedSocket::with_bind_mode(target, self.bind_mode)
        } else {
            ZonedSocket::passthrough(target)
        }
    }
}
