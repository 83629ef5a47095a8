//! Sampler configuration
//!
//! Values come from an optional TOML file, then `VITALS__*` environment
//! variables (e.g. `VITALS__INTERVAL_MS=500`, `VITALS__GPU__ENABLED=false`),
//! then the defaults below for anything neither sets.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::alerts::DEFAULT_HYSTERESIS_FACTOR;
use crate::error::{ConfigError, ConfigResult};
use crate::history::DEFAULT_HISTORY_CAPACITY;

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "VITALS";

/// Name of the threshold settings document inside the config directory
pub const THRESHOLDS_FILE_NAME: &str = "thresholds.json";

/// Sampling loop configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Period between sampling ticks
    pub interval_ms: u64,
    /// Samples retained per metric
    pub history_capacity: usize,
    /// Fraction of the threshold a metric must fall below to clear its alert
    pub hysteresis_factor: f64,
    /// Publications buffered for slow subscribers before they start lagging
    pub channel_capacity: usize,
    /// Threshold settings document, defaults to the user config directory
    pub thresholds_path: Option<PathBuf>,
    pub gpu: GpuConfig,
}

/// GPU probing settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpuConfig {
    pub enabled: bool,
    /// `nvidia-smi` executable name or path
    pub command: String,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interval_ms: 2000,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            hysteresis_factor: DEFAULT_HYSTERESIS_FACTOR,
            channel_capacity: 64,
            thresholds_path: None,
            gpu: GpuConfig::default(),
        }
    }
}

impl Default for GpuConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: "nvidia-smi".to_string(),
        }
    }
}

impl SamplerConfig {
    /// Loads configuration from `path` (when given) and the environment
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigError::InvalidValue {
                    field: "config_file".to_string(),
                    value: path.display().to_string(),
                });
            }
            builder = builder.add_source(
                config::File::from(path).format(config::FileFormat::Toml),
            );
        }

        let config: SamplerConfig = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        tracing::debug!("Loaded sampler configuration: {:?}", config);
        Ok(config)
    }

    /// Writes the configuration as TOML
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::InvalidValue {
            field: "config".to_string(),
            value: e.to_string(),
        })?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| ConfigError::InvalidValue {
                field: "config_file".to_string(),
                value: format!("{}: {}", parent.display(), e),
            })?;
        }
        fs::write(path, content).map_err(|e| ConfigError::InvalidValue {
            field: "config_file".to_string(),
            value: format!("{}: {}", path.display(), e),
        })?;
        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.interval_ms == 0 {
            return Err(invalid("interval_ms", self.interval_ms));
        }
        if !(self.hysteresis_factor > 0.0 && self.hysteresis_factor <= 1.0) {
            return Err(invalid("hysteresis_factor", self.hysteresis_factor));
        }
        if self.history_capacity == 0 {
            return Err(invalid("history_capacity", self.history_capacity));
        }
        if self.channel_capacity == 0 {
            return Err(invalid("channel_capacity", self.channel_capacity));
        }
        if self.gpu.enabled && self.gpu.command.trim().is_empty() {
            return Err(invalid("gpu.command", "<empty>"));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Where thresholds are persisted, `None` when no config directory exists
    pub fn thresholds_path(&self) -> Option<PathBuf> {
        self.thresholds_path
            .clone()
            .or_else(|| default_config_dir().map(|dir| dir.join(THRESHOLDS_FILE_NAME)))
    }
}

/// Per-user configuration directory, e.g. `~/.config/vitals` on Linux
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("vitals"))
}

fn invalid(field: &str, value: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    }
}
