//! Config loading: defaults, file, environment.

use super::defaults::builder_with_defaults;
use super::ZonedConfig;
use config::{ConfigError, Environment, File, FileFormat};
use std::path::Path;
use tracing::debug;

pub const ENV_PREFIX: &str = "ZONED";

/// Loads [`ZonedConfig`]
pub struct ConfigLoader;

impl ConfigLoader {
    /// Defaults, then `path` if given, then `ZONED_*` environment variables
    /// (`ZONED_ENGINE__BIND_MODE=fork_per_task`). A missing file is an error.
    pub fn load(path: Option<&Path>) -> Result<ZonedConfig, ConfigError> {
        let mut builder = builder_with_defaults()?;
        if let Some(path) = path {
            debug!(config_path = %path.display(), "Loading configuration file");
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("interception.disabled")
                .try_parsing(true),
        );
        builder.build()?.try_deserialize()
    }

    /// Defaults and `path` only, ignoring the environment.
    pub fn load_from_file(path: &Path) -> Result<ZonedConfig, ConfigError> {
        builder_with_defaults()?
            .add_source(File::from(path).format(FileFormat::Toml).required(true))
            .build()?
            .try_deserialize()
    }

    /// Defaults and an in-memory TOML document.
    pub fn from_toml_str(toml: &str) -> Result<ZonedConfig, ConfigError> {
        builder_with_defaults()?
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}
