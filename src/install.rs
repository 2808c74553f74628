//! One-call installation from configuration.

use crate::adapters::{ApplyReport, HostRegistry};
use crate::config::ZonedConfig;
use crate::error::EngineError;
use crate::zone::Zone;
use tracing::debug;

/// Validate `config`, seed the root zone's properties and apply the
/// configured interception table to `registry`.
///
/// Nothing is changed if the registry was already applied or the
/// configuration is invalid.
pub fn install(config: &ZonedConfig, registry: &mut HostRegistry) -> Result<ApplyReport, EngineError> {
    if registry.is_applied() {
        return Err(EngineError::AlreadyApplied);
    }
    config.validated()?;
    let table = config.interception_table()?;

    let root = Zone::root();
    for (key, value) in &config.engine.root_properties {
        debug!(key = %key, "Seeding root zone property");
        root.set(key.clone(), value.clone());
    }

    registry.apply(&table, config.engine.bind_mode)
}
