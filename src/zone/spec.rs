//! Fork configuration.

use crate::error::ZoneError;
use crate::zone::hooks::{HookName, Hooks};
use crate::zone::{Properties, Zone};
use serde_json::Value;
use std::sync::Arc;

/// Hooks and properties applied on top of the parent when forking
#[derive(Clone, Debug, Default)]
pub struct ZoneSpec {
    pub(crate) hooks: Hooks,
    pub(crate) properties: Properties,
}

impl ZoneSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a spec from a JSON object of properties.
    ///
    /// Keys naming a recognized hook are rejected: hooks are callbacks and
    /// cannot be expressed as data.
    pub fn from_value(value: Value) -> Result<Self, ZoneError> {
        let Value::Object(properties) = value else {
            return Err(ZoneError::InvalidSpec(format!(
                "expected a JSON object, got {}",
                value
            )));
        };
        if let Some(key) = properties.keys().find(|k| HookName::is_reserved(k)) {
            return Err(ZoneError::InvalidSpec(format!(
                "'{}' is a hook name and cannot be set as a property",
                key
            )));
        }
        Ok(Self {
            hooks: Hooks::default(),
            properties,
        })
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn before_task(mut self, hook: impl Fn(&Zone) + Send + Sync + 'static) -> Self {
        self.hooks.before_task = Some(Arc::new(hook));
        self
    }

    pub fn after_task(mut self, hook: impl Fn(&Zone) + Send + Sync + 'static) -> Self {
        self.hooks.after_task = Some(Arc::new(hook));
        self
    }

    pub fn on_zone_created(mut self, hook: impl Fn(&Arc<Zone>) + Send + Sync + 'static) -> Self {
        self.hooks.on_zone_created = Some(Arc::new(hook));
        self
    }

    pub fn on_error(mut self, hook: impl Fn(&ZoneError) + Send + Sync + 'static) -> Self {
        self.hooks.on_error = Some(Arc::new(hook));
        self
    }

    /// Replace host alert dialogs for code running in the forked zone.
    pub fn alert(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.hooks.alert = Some(Arc::new(hook));
        self
    }

    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }
}
