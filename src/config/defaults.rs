//! Built-in defaults, the lowest configuration layer.

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};

pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("engine.bind_mode", "capture")?
        .set_default("logging.level", "info")?
        .set_default("logging.format", "text")?
        .set_default("logging.output", "stderr")
}
