//! Configuration
//!
//! Layered configuration for the engine: built-in defaults, an optional TOML
//! file, then `ZONED_`-prefixed environment variables.

use crate::adapters::InterceptionTable;
use crate::error::EngineError;
use crate::interception::BindMode;
use crate::logging::{self, LoggingConfig};
use crate::zone::hooks::HookName;
use crate::zone::Properties;
use serde::{Deserialize, Serialize};

mod defaults;
mod loader;

pub use loader::ConfigLoader;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZonedConfig {
    #[serde(default)]
    pub engine: EngineSettings,

    #[serde(default)]
    pub interception: InterceptionSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Zone engine settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Zone that intercepted callbacks run in
    #[serde(default)]
    pub bind_mode: BindMode,

    /// Properties seeded onto the root zone at install time
    #[serde(default)]
    pub root_properties: Properties,
}

/// Which entry points to leave unpatched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterceptionSettings {
    #[serde(default)]
    pub disabled: Vec<String>,
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Engine(String),
    Interception(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Engine(msg) => write!(f, "Engine: {}", msg),
            ValidationError::Interception(msg) => write!(f, "Interception: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl ZonedConfig {
    /// Validate the entire configuration, reporting every problem found.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        for key in self.engine.root_properties.keys() {
            if HookName::is_reserved(key) {
                errors.push(ValidationError::Engine(format!(
                    "root property '{}' collides with a hook name",
                    key
                )));
            }
        }

        let known = InterceptionTable::browser();
        for name in &self.interception.disabled {
            if !known.is_known(name) {
                errors.push(ValidationError::Interception(format!(
                    "unknown entry point '{}'",
                    name
                )));
            }
        }

        if let Err(e) = logging::validate(&self.logging) {
            errors.push(ValidationError::Logging(e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// The validated configuration as a single error, for `?` call sites.
    pub fn validated(&self) -> Result<(), EngineError> {
        self.validate().map_err(|errors| {
            let msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            EngineError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                msgs.join("\n")
            ))
        })
    }

    /// The browser table minus the disabled entry points.
    pub fn interception_table(&self) -> Result<InterceptionTable, EngineError> {
        InterceptionTable::browser().without(&self.interception.disabled)
    }
}
