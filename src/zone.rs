//! Zones: the propagated execution context.
//!
//! A zone carries properties and hooks and forms a tree through [`Zone::fork`].
//! Exactly one zone is active per thread at any instant. [`Zone::run`] makes a
//! zone active for the duration of a closure and restores the previous one on
//! every exit path; [`Zone::bind`] captures a zone so a callback re-enters it
//! whenever it is later invoked, whoever invokes it.

use crate::error::ZoneError;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::sync::Notify;
use tracing::{debug, trace_span};

mod activation;
pub mod hooks;
mod id;
mod pending;
mod spec;

use activation::Activation;
use hooks::{AlertHook, Hook, HookName, Hooks};

pub use id::ZoneId;
pub use pending::PendingTask;
pub use spec::ZoneSpec;

/// Zone properties, copied (never shared) from parent to child at fork time.
pub type Properties = serde_json::Map<String, Value>;

static ROOT: OnceLock<Arc<Zone>> = OnceLock::new();

pub struct Zone {
    id: ZoneId,
    parent: Option<Arc<Zone>>,
    properties: RwLock<Properties>,
    hooks: Hooks,
    pending: AtomicUsize,
    drained: Notify,
}

enum Failure {
    Error(ZoneError),
    Panic(Box<dyn Any + Send + 'static>),
}

impl Zone {
    /// The process-wide root zone, created on first use.
    pub fn root() -> &'static Arc<Zone> {
        ROOT.get_or_init(|| {
            let root = Arc::new(Zone::new(None, Properties::new(), Hooks::default()));
            debug!(zone = %root.id, "root zone created");
            root
        })
    }

    /// The zone active on this thread.
    pub fn current() -> Arc<Zone> {
        activation::current()
    }

    fn new(parent: Option<Arc<Zone>>, properties: Properties, hooks: Hooks) -> Self {
        Self {
            id: ZoneId::next(),
            parent,
            properties: RwLock::new(properties),
            hooks,
            pending: AtomicUsize::new(0),
            drained: Notify::new(),
        }
    }

    pub fn id(&self) -> ZoneId {
        self.id
    }

    pub fn parent(&self) -> Option<&Arc<Zone>> {
        self.parent.as_ref()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Number of ancestors between this zone and the root.
    pub fn depth(&self) -> usize {
        std::iter::successors(self.parent.as_deref(), |z| z.parent.as_deref()).count()
    }

    /// Derive a child zone.
    ///
    /// The child's properties are a deep copy of this zone's with the spec's
    /// properties applied on top; its hooks are the spec's own, falling back
    /// to this zone's chain at resolution time. The `on_zone_created` hook
    /// resolved from this zone's chain is invoked with the child.
    pub fn fork(self: &Arc<Self>, spec: ZoneSpec) -> Arc<Zone> {
        let mut properties = self.properties.read().clone();
        properties.extend(spec.properties);

        let child = Arc::new(Zone::new(Some(Arc::clone(self)), properties, spec.hooks));
        debug!(zone = %child.id, parent = %self.id, "zone forked");

        if let Some(hook) = self.resolve(|h| h.on_zone_created.as_ref()) {
            hook(&child);
        }
        child
    }

    /// Run `task` synchronously with this zone active.
    ///
    /// Returns `Ok(Some(value))` on success and `Ok(None)` when the task
    /// failed and an `on_error` hook consumed the failure. Without a hook an
    /// error is returned as [`ZoneError::Task`] and a panic keeps unwinding.
    /// Either way `after_task` fires and the previously active zone is
    /// restored first.
    pub fn run<T>(
        self: &Arc<Self>,
        task: impl FnOnce() -> anyhow::Result<T>,
    ) -> Result<Option<T>, ZoneError> {
        let span = trace_span!("zone.run", zone = self.id.as_u64());
        let _span = span.enter();
        let activation = Activation::enter(Arc::clone(self));

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            if let Some(hook) = self.resolve(|h| h.before_task.as_ref()) {
                hook(&**self);
            }
            task()
        }));

        let result = match outcome {
            Ok(Ok(value)) => Ok(Some(value)),
            Ok(Err(source)) => self
                .handle_failure(Failure::Error(ZoneError::Task {
                    zone: self.id,
                    source,
                }))
                .map(|()| None),
            Err(payload) => self.handle_failure(Failure::Panic(payload)).map(|()| None),
        };

        if let Some(hook) = self.resolve(|h| h.after_task.as_ref()) {
            hook(&**self);
        }
        drop(activation);

        match result {
            Ok(value) => Ok(value),
            Err(Failure::Error(err)) => Err(err),
            Err(Failure::Panic(payload)) => panic::resume_unwind(payload),
        }
    }

    fn handle_failure(&self, failure: Failure) -> Result<(), Failure> {
        let Some(hook) = self.resolve(|h| h.on_error.as_ref()) else {
            return Err(failure);
        };
        let err = match failure {
            Failure::Error(err) => err,
            Failure::Panic(payload) => ZoneError::Panicked {
                zone: self.id,
                message: panic_message(payload.as_ref()),
            },
        };
        debug!(zone = %self.id, error = %err, "task failure handled by onError");
        hook(&err);
        Ok(())
    }

    /// Wrap `f` so every invocation runs inside this zone.
    pub fn bind<A, R, F>(self: &Arc<Self>, mut f: F) -> impl FnMut(A) -> Result<Option<R>, ZoneError>
    where
        F: FnMut(A) -> anyhow::Result<R>,
    {
        let zone = Arc::clone(self);
        move |args| zone.run(|| f(args))
    }

    /// Like [`Zone::bind`], but a non-root zone first forks an anonymous
    /// child for the callback, so `on_zone_created` fires once per bound
    /// callback and the callback's zone has this zone as its parent.
    pub fn bind_in_child<A, R, F>(
        self: &Arc<Self>,
        f: F,
    ) -> impl FnMut(A) -> Result<Option<R>, ZoneError>
    where
        F: FnMut(A) -> anyhow::Result<R>,
    {
        let target = if self.is_root() {
            Arc::clone(self)
        } else {
            self.fork(ZoneSpec::new())
        };
        target.bind(f)
    }

    /// First definition of `name` on this zone or its ancestors.
    pub fn resolve_hook(&self, name: HookName) -> Option<Hook> {
        self.ancestry().find_map(|zone| zone.hooks.get(name))
    }

    pub(crate) fn alert_hook(&self) -> Option<AlertHook> {
        self.resolve(|h| h.alert.as_ref())
    }

    fn resolve<T: Clone>(&self, pick: impl Fn(&Hooks) -> Option<&T>) -> Option<T> {
        self.ancestry().find_map(|zone| pick(&zone.hooks).cloned())
    }

    /// This zone followed by its ancestors up to the root.
    pub fn ancestry(&self) -> impl Iterator<Item = &Zone> {
        std::iter::successors(Some(self), |z| z.parent.as_deref())
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.properties.read().get(key).cloned()
    }

    /// Read a property and deserialize it into `T`.
    pub fn property<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key)
            .and_then(|value| serde_json::from_value(value).ok())
    }

    /// Set a property on this zone only. Returns the previous value.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.properties.write().insert(key.into(), value.into())
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.properties.write().remove(key)
    }

    /// Snapshot of all properties.
    pub fn properties(&self) -> Properties {
        self.properties.read().clone()
    }

    pub fn pending_tasks(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    pub fn is_drained(&self) -> bool {
        self.pending_tasks() == 0
    }

    /// Wait until every pending task registered against this zone settled.
    pub async fn drained(&self) {
        loop {
            let notified = self.drained.notified();
            if self.is_drained() {
                return;
            }
            notified.await;
        }
    }

    pub(crate) fn increment_pending(&self) -> usize {
        self.pending.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub(crate) fn decrement_pending(&self) -> usize {
        let remaining = self.pending.fetch_sub(1, Ordering::AcqRel) - 1;
        if remaining == 0 {
            self.drained.notify_waiters();
        }
        remaining
    }
}

impl fmt::Debug for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Zone")
            .field("id", &self.id)
            .field("parent", &self.parent.as_ref().map(|p| p.id))
            .field("hooks", &self.hooks)
            .field("pending", &self.pending_tasks())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// The zone active on this thread.
pub fn current() -> Arc<Zone> {
    Zone::current()
}

/// Fork a child of the active zone.
pub fn fork(spec: ZoneSpec) -> Arc<Zone> {
    current().fork(spec)
}

/// Bind `f` to the active zone.
pub fn bind<A, R, F>(f: F) -> impl FnMut(A) -> Result<Option<R>, ZoneError>
where
    F: FnMut(A) -> anyhow::Result<R>,
{
    current().bind(f)
}

/// Bind `f` to a fresh child of the active zone (or the root itself).
pub fn bind_in_child<A, R, F>(f: F) -> impl FnMut(A) -> Result<Option<R>, ZoneError>
where
    F: FnMut(A) -> anyhow::Result<R>,
{
    current().bind_in_child(f)
}
