//! Zone hooks and their resolution names.
//!
//! A zone stores only the hooks it was forked with. Lookups walk toward the
//! root and take the first definition found; the root defines none, so an
//! unresolved `on_error` means "propagate to the caller".

use crate::error::ZoneError;
use crate::zone::Zone;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

pub type TaskHook = Arc<dyn Fn(&Zone) + Send + Sync>;
pub type ZoneCreatedHook = Arc<dyn Fn(&Arc<Zone>) + Send + Sync>;
pub type ErrorHook = Arc<dyn Fn(&ZoneError) + Send + Sync>;
pub type AlertHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Recognized hook names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookName {
    BeforeTask,
    AfterTask,
    OnZoneCreated,
    OnError,
    Alert,
}

impl HookName {
    pub const ALL: [HookName; 5] = [
        HookName::BeforeTask,
        HookName::AfterTask,
        HookName::OnZoneCreated,
        HookName::OnError,
        HookName::Alert,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            HookName::BeforeTask => "beforeTask",
            HookName::AfterTask => "afterTask",
            HookName::OnZoneCreated => "onZoneCreated",
            HookName::OnError => "onError",
            HookName::Alert => "alert",
        }
    }

    /// Whether a configuration key names a hook rather than a property.
    pub fn is_reserved(key: &str) -> bool {
        key.parse::<HookName>().is_ok()
    }
}

impl fmt::Display for HookName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HookName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HookName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| format!("not a hook name: {}", s))
    }
}

/// A resolved hook of any kind
#[derive(Clone)]
pub enum Hook {
    Task(TaskHook),
    ZoneCreated(ZoneCreatedHook),
    Error(ErrorHook),
    Alert(AlertHook),
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Hook::Task(_) => "Task",
            Hook::ZoneCreated(_) => "ZoneCreated",
            Hook::Error(_) => "Error",
            Hook::Alert(_) => "Alert",
        };
        write!(f, "Hook::{}", kind)
    }
}

/// Hooks defined directly on one zone
#[derive(Clone, Default)]
pub struct Hooks {
    pub before_task: Option<TaskHook>,
    pub after_task: Option<TaskHook>,
    pub on_zone_created: Option<ZoneCreatedHook>,
    pub on_error: Option<ErrorHook>,
    pub alert: Option<AlertHook>,
}

impl Hooks {
    pub fn get(&self, name: HookName) -> Option<Hook> {
        match name {
            HookName::BeforeTask => self.before_task.clone().map(Hook::Task),
            HookName::AfterTask => self.after_task.clone().map(Hook::Task),
            HookName::OnZoneCreated => self.on_zone_created.clone().map(Hook::ZoneCreated),
            HookName::OnError => self.on_error.clone().map(Hook::Error),
            HookName::Alert => self.alert.clone().map(Hook::Alert),
        }
    }

    pub fn defined(&self) -> Vec<HookName> {
        HookName::ALL
            .into_iter()
            .filter(|name| self.get(*name).is_some())
            .collect()
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.defined()).finish()
    }
}
