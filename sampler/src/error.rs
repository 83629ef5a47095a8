//! Error handling for the vitals sampler
//!
//! None of these conditions is fatal: source failures are retried on the next
//! tick, persistence failures fall back to defaults, and invalid thresholds are
//! rejected before they reach the evaluator.

use std::io;

use thiserror::Error;

/// The main error type for the sampler library
#[derive(Error, Debug)]
pub enum VitalsError {
    /// Metrics source failures
    #[error("Metrics source error: {0}")]
    Source(#[from] SourceError),

    /// Configuration and threshold validation errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Threshold persistence errors
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Sampling loop lifecycle errors
    #[error("Sampler error: {0}")]
    Sampler(#[from] SamplerError),

}

/// Reasons a metrics source could not produce a snapshot
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    #[error("metrics provider unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("permission denied: {reason}")]
    PermissionDenied { reason: String },

    #[error("platform unsupported: {reason}")]
    Unsupported { reason: String },
}

impl SourceError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        SourceError::Unavailable { reason: reason.into() }
    }
}

/// Configuration related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unknown threshold key: {key}")]
    UnknownKey { key: String },

    #[error("Threshold {key} = {value} is outside {min}..={max}")]
    OutOfRange {
        key: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Threshold {key} must be a finite number")]
    NotFinite { key: String },

    #[error("Invalid configuration value: {field} = {value}")]
    InvalidValue { field: String, value: String },

    #[error("Configuration loading failed: {0}")]
    Load(#[from] config::ConfigError),
}

/// Threshold persistence errors
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Storage read failed for {path}: {source}")]
    Read { path: String, source: io::Error },

    #[error("Storage write failed for {path}: {source}")]
    Write { path: String, source: io::Error },

    #[error("Stored record is corrupt: {reason}")]
    Corrupt { reason: String },
}

/// Sampling loop lifecycle errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SamplerError {
    #[error("Sampling loop is already running")]
    AlreadyRunning,

    #[error("Sampling loop has been stopped")]
    Stopped,
}

/// A specialized result type for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// A specialized result type for persistence operations
pub type PersistenceResult<T> = std::result::Result<T, PersistenceError>;

impl VitalsError {
    /// Whether the next sampling tick can be expected to recover from this error
    pub fn is_transient(&self) -> bool {
        match self {
            VitalsError::Source(SourceError::Unsupported { .. }) => false,
            VitalsError::Source(_) => true,
            VitalsError::Persistence(_) => true,
            VitalsError::Config(_) | VitalsError::Sampler(_) => false,
        }
    }

    /// Get the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            VitalsError::Source(_) => "source",
            VitalsError::Config(_) => "config",
            VitalsError::Persistence(_) => "persistence",
            VitalsError::Sampler(_) => "sampler",
        }
    }
}
