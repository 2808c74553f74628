//! Error types for the zone engine and its installation layer.

use crate::zone::ZoneId;
use thiserror::Error;

/// Errors raised by work executing inside a zone
#[derive(Debug, Error)]
pub enum ZoneError {
    #[error("Task failed in zone {zone}: {source}")]
    Task {
        zone: ZoneId,
        #[source]
        source: anyhow::Error,
    },

    #[error("Task panicked in zone {zone}: {message}")]
    Panicked { zone: ZoneId, message: String },

    /// The failure was already consumed by an `on_error` hook, but the caller
    /// still needs a value it cannot have.
    #[error("Failure in zone {zone} was handled by its onError hook")]
    Handled { zone: ZoneId },

    #[error("Invalid zone spec: {0}")]
    InvalidSpec(String),
}

impl ZoneError {
    /// Zone the failure happened in, when there is one.
    pub fn zone(&self) -> Option<ZoneId> {
        match self {
            ZoneError::Task { zone, .. }
            | ZoneError::Panicked { zone, .. }
            | ZoneError::Handled { zone } => Some(*zone),
            ZoneError::InvalidSpec(_) => None,
        }
    }
}

/// Installation and configuration errors
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Unknown entry point: {0}")]
    InvalidEntryPoint(String),

    #[error("Interception table already applied to this host")]
    AlreadyApplied,

    #[error("Zone error: {0}")]
    Zone(#[from] ZoneError),
}

impl From<config::ConfigError> for EngineError {
    fn from(err: config::ConfigError) -> Self {
        EngineError::ConfigError(err.to_string())
    }
}
