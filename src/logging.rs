//! Logging
//!
//! Structured logging on `tracing-subscriber`. Level, format and destination
//! come from [`LoggingConfig`], overridable per process through the
//! `ZONED_LOG*` environment variables.

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

pub const LOG_ENV: &str = "ZONED_LOG";
pub const LOG_FORMAT_ENV: &str = "ZONED_LOG_FORMAT";
pub const LOG_OUTPUT_ENV: &str = "ZONED_LOG_OUTPUT";
pub const LOG_MODULES_ENV: &str = "ZONED_LOG_MODULES";

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// trace, debug, info, warn, error, off
    #[serde(default = "default_log_level")]
    pub level: String,

    /// json or text
    #[serde(default = "default_format")]
    pub format: String,

    /// stdout, stderr or file
    #[serde(default = "default_output")]
    pub output: String,

    /// Log file path, used when `output` is "file"
    #[serde(default = "default_log_file")]
    pub file: PathBuf,

    /// ANSI colors (text format on a terminal stream only)
    #[serde(default = "default_true")]
    pub color: bool,

    /// Per-module levels, e.g. `zoned::interception = "trace"`
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "text".to_string()
}

fn default_output() -> String {
    "stderr".to_string()
}

fn default_log_file() -> PathBuf {
    PathBuf::from("zoned.log")
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_format(),
            output: default_output(),
            file: default_log_file(),
            color: default_true(),
            modules: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Output {
    Stdout,
    Stderr,
    File,
}

/// Install the global subscriber.
///
/// Priority (highest first): environment variables, `config`, defaults.
/// Fails if a global subscriber is already installed.
pub fn init_logging(config: Option<&LoggingConfig>) -> Result<(), EngineError> {
    let defaults = LoggingConfig::default();
    let config = config.unwrap_or(&defaults);

    let filter = build_env_filter(config)?;
    let format = determine_format(config)?;
    let output = determine_output(config)?;

    let writer = match output {
        Output::Stdout => BoxMakeWriter::new(std::io::stdout),
        Output::Stderr => BoxMakeWriter::new(std::io::stderr),
        Output::File => BoxMakeWriter::new(open_log_file(config)?),
    };
    let ansi = config.color && output != Output::File;

    let base = Registry::default().with(filter);
    let result = match format {
        Format::Json => base
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(writer),
            )
            .try_init(),
        Format::Text => base
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(ansi)
                    .with_writer(writer),
            )
            .try_init(),
    };
    result.map_err(|e| EngineError::ConfigError(format!("Failed to install logger: {}", e)))
}

fn open_log_file(config: &LoggingConfig) -> Result<std::fs::File, EngineError> {
    if let Some(parent) = config.file.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            EngineError::ConfigError(format!("Failed to create log directory: {}", e))
        })?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.file)
        .map_err(|e| {
            EngineError::ConfigError(format!("Failed to open log file {:?}: {}", config.file, e))
        })
}

fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter, EngineError> {
    if let Ok(filter) = EnvFilter::try_from_env(LOG_ENV) {
        return Ok(filter);
    }

    if config.level == "off" {
        return Ok(EnvFilter::new("off"));
    }

    let mut filter = parse_level(&config.level)?;
    for (module, level) in &config.modules {
        filter = filter.add_directive(parse_directive(module, level)?);
    }

    if let Ok(modules) = std::env::var(LOG_MODULES_ENV) {
        for spec in modules.split(',').filter(|s| !s.trim().is_empty()) {
            let Some((module, level)) = spec.split_once('=') else {
                return Err(EngineError::ConfigError(format!(
                    "Invalid {} entry: {}",
                    LOG_MODULES_ENV, spec
                )));
            };
            filter = filter.add_directive(parse_directive(module, level)?);
        }
    }

    Ok(filter)
}

fn parse_level(level: &str) -> Result<EnvFilter, EngineError> {
    let invalid = || EngineError::ConfigError(format!("Invalid log level: {}", level));
    // A bare word that is not a level would be read as a target name.
    for directive in level.split(',').map(str::trim).filter(|d| !d.is_empty()) {
        if !directive.contains('=') && directive.parse::<LevelFilter>().is_err() {
            return Err(invalid());
        }
    }
    EnvFilter::try_new(level).map_err(|_| invalid())
}

fn parse_directive(
    module: &str,
    level: &str,
) -> Result<tracing_subscriber::filter::Directive, EngineError> {
    format!("{}={}", module.trim(), level.trim())
        .parse()
        .map_err(|e| EngineError::ConfigError(format!("Invalid log directive: {}", e)))
}

fn determine_format(config: &LoggingConfig) -> Result<Format, EngineError> {
    match std::env::var(LOG_FORMAT_ENV) {
        Ok(format) => parse_format(&format),
        Err(_) => parse_format(&config.format),
    }
}

fn parse_format(format: &str) -> Result<Format, EngineError> {
    match format {
        "text" => Ok(Format::Text),
        "json" => Ok(Format::Json),
        _ => Err(EngineError::ConfigError(format!(
            "Invalid log format: {} (must be 'json' or 'text')",
            format
        ))),
    }
}

fn determine_output(config: &LoggingConfig) -> Result<Output, EngineError> {
    match std::env::var(LOG_OUTPUT_ENV) {
        Ok(output) => parse_output(&output),
        Err(_) => parse_output(&config.output),
    }
}

fn parse_output(output: &str) -> Result<Output, EngineError> {
    match output {
        "stdout" => Ok(Output::Stdout),
        "stderr" => Ok(Output::Stderr),
        "file" => Ok(Output::File),
        _ => Err(EngineError::ConfigError(format!(
            "Invalid log output: {} (must be 'stdout', 'stderr' or 'file')",
            output
        ))),
    }
}

/// Check a config without installing anything.
pub(crate) fn validate(config: &LoggingConfig) -> Result<(), String> {
    parse_level(&config.level).map_err(|e| e.to_string())?;
    parse_format(&config.format).map_err(|e| e.to_string())?;
    parse_output(&config.output).map_err(|e| e.to_string())?;
    for (module, level) in &config.modules {
        parse_directive(module, level).map_err(|e| e.to_string())?;
    }
    Ok(())
}
