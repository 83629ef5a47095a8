use thiserror::Error;
use vitals_sampler::{ConfigError, SamplerError, SourceError, VitalsError};

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Vitals(#[from] VitalsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::ser::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Operation cancelled by user")]
    Cancelled,
}

impl From<ConfigError> for CliError {
    fn from(error: ConfigError) -> Self {
        CliError::Vitals(VitalsError::from(error))
    }
}

impl From<SourceError> for CliError {
    fn from(error: SourceError) -> Self {
        CliError::Vitals(VitalsError::from(error))
    }
}

impl From<SamplerError> for CliError {
    fn from(error: SamplerError) -> Self {
        CliError::Vitals(VitalsError::from(error))
    }
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Io(_) => 2,
            CliError::Validation(_) => 3,
            CliError::Vitals(VitalsError::Source(SourceError::PermissionDenied { .. })) => 4,
            CliError::Vitals(e) if e.is_transient() => 10,
            CliError::Cancelled => 130, // Standard Unix signal for SIGINT
            _ => 1,                     // Generic error
        }
    }

    /// Error category for structured logs
    pub fn category(&self) -> &'static str {
        match self {
            CliError::Vitals(e) => e.category(),
            CliError::Io(_) => "io",
            CliError::Json(_) | CliError::Yaml(_) | CliError::Toml(_) => "serialization",
            CliError::Validation(_) => "validation",
            CliError::Cancelled => "cancelled",
        }
    }
}

pub type Result<T> = std::result::Result<T, CliError>;

/// Format error for user-friendly display
pub fn format_error(error: &CliError) -> String {
    match error {
        CliError::Vitals(VitalsError::Config(ConfigError::UnknownKey { key })) => {
            format!(
                "Unknown threshold: {}\n\nValid thresholds: cpu, memory, swap, gpu, gpuMemory, temperature, diskIO, networkIO.",
                key
            )
        }
        CliError::Vitals(VitalsError::Config(ConfigError::OutOfRange { .. })) => {
            format!("{}\n\nRun 'vitalsctl thresholds show' to see each threshold's range.", error)
        }
        CliError::Vitals(VitalsError::Config(e)) => {
            format!("Configuration Error: {}\n\nTry running 'vitalsctl config show' to check your configuration.", e)
        }
        CliError::Vitals(VitalsError::Source(SourceError::PermissionDenied { reason })) => {
            format!("Permission Denied: {}\n\nPlease run with privileges that can read system metrics.", reason)
        }
        CliError::Vitals(e) if e.is_transient() => {
            format!("Metrics Unavailable: {}\n\nThe metrics provider may be starting up; try again shortly.", e)
        }
        CliError::Cancelled => "Operation cancelled by user.".to_string(),
        _ => error.to_string(),
    }
}
