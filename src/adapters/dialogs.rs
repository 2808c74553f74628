//! Blocking host dialogs (`alert`, `prompt`).

use crate::zone;
use std::sync::Arc;
use tracing::trace;

pub trait Dialogs: Send + Sync {
    fn alert(&self, message: &str);
    fn prompt(&self, message: &str, default: Option<&str>) -> Option<String>;
}

/// Routes `alert` to the active zone's resolved `alert` hook, which replaces
/// the host dialog entirely. `prompt` goes to the host unchanged.
pub struct ZonedDialogs {
    inner: Arc<dyn Dialogs>,
    route_alert: bool,
}

impl ZonedDialogs {
    pub fn new(inner: Arc<dyn Dialogs>) -> Self {
        Self {
            inner,
            route_alert: true,
        }
    }

    /// Leave `alert` unpatched (the entry point was disabled).
    pub fn without_alert_routing(mut self) -> Self {
        self.route_alert = false;
        self
    }

    pub fn original(&self) -> &Arc<dyn Dialogs> {
        &self.inner
    }
}

impl Dialogs for ZonedDialogs {
    fn alert(&self, message: &str) {
        if self.route_alert {
            let zone = zone::current();
            if let Some(hook) = zone.alert_hook() {
                trace!(zone = %zone.id(), "alert handled by zone hook");
                hook(message);
                return;
            }
        }
        self.inner.alert(message);
    }

    fn prompt(&self, message: &str, default: Option<&str>) -> Option<String> {
        self.inner.prompt(message, default)
    }
}
