//! User-configurable alert thresholds
//!
//! Every threshold lives in a fixed display range. Values entering through
//! [`ThresholdConfig::set`] or [`SharedThresholds::update`] are rejected when
//! outside that range; values read back from storage are clamped into it.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::watch;

use crate::error::{ConfigError, ConfigResult};
use crate::store::ThresholdStore;

/// Metric kinds that carry a threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ThresholdKey {
    Cpu,
    Memory,
    Swap,
    Gpu,
    GpuMemory,
    Temperature,
    DiskIo,
    NetworkIo,
}

impl ThresholdKey {
    pub const ALL: [ThresholdKey; 8] = [
        ThresholdKey::Cpu,
        ThresholdKey::Memory,
        ThresholdKey::Swap,
        ThresholdKey::Gpu,
        ThresholdKey::GpuMemory,
        ThresholdKey::Temperature,
        ThresholdKey::DiskIo,
        ThresholdKey::NetworkIo,
    ];

    /// Storage and display name
    pub fn as_str(&self) -> &'static str {
        match self {
            ThresholdKey::Cpu => "cpu",
            ThresholdKey::Memory => "memory",
            ThresholdKey::Swap => "swap",
            ThresholdKey::Gpu => "gpu",
            ThresholdKey::GpuMemory => "gpuMemory",
            ThresholdKey::Temperature => "temperature",
            ThresholdKey::DiskIo => "diskIO",
            ThresholdKey::NetworkIo => "networkIO",
        }
    }

    pub fn default_value(&self) -> f64 {
        match self {
            ThresholdKey::Cpu => 90.0,
            ThresholdKey::Memory => 90.0,
            ThresholdKey::Swap => 80.0,
            ThresholdKey::Gpu => 95.0,
            ThresholdKey::GpuMemory => 90.0,
            ThresholdKey::Temperature => 85.0,
            ThresholdKey::DiskIo => 500.0,
            ThresholdKey::NetworkIo => 100.0,
        }
    }

    /// Inclusive range accepted for this threshold
    pub fn range(&self) -> (f64, f64) {
        match self {
            ThresholdKey::Temperature => (0.0, 120.0),
            ThresholdKey::DiskIo | ThresholdKey::NetworkIo => (1.0, 10_000.0),
            _ => (0.0, 100.0),
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            ThresholdKey::Temperature => "°C",
            ThresholdKey::DiskIo | ThresholdKey::NetworkIo => "MiB/s",
            _ => "%",
        }
    }

    /// Temperature-class metrics raise error-severity alerts
    pub fn is_temperature(&self) -> bool {
        matches!(self, ThresholdKey::Temperature)
    }
}

impl fmt::Display for ThresholdKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThresholdKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ThresholdKey::ALL
            .into_iter()
            .find(|key| key.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ConfigError::UnknownKey { key: s.to_string() })
    }
}

/// Threshold per metric kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdConfig {
    pub cpu: f64,
    pub memory: f64,
    pub swap: f64,
    pub gpu: f64,
    pub gpu_memory: f64,
    pub temperature: f64,
    #[serde(rename = "diskIO")]
    pub disk_io: f64,
    #[serde(rename = "networkIO")]
    pub network_io: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            cpu: ThresholdKey::Cpu.default_value(),
            memory: ThresholdKey::Memory.default_value(),
            swap: ThresholdKey::Swap.default_value(),
            gpu: ThresholdKey::Gpu.default_value(),
            gpu_memory: ThresholdKey::GpuMemory.default_value(),
            temperature: ThresholdKey::Temperature.default_value(),
            disk_io: ThresholdKey::DiskIo.default_value(),
            network_io: ThresholdKey::NetworkIo.default_value(),
        }
    }
}

impl ThresholdConfig {
    pub fn get(&self, key: ThresholdKey) -> f64 {
        match key {
            ThresholdKey::Cpu => self.cpu,
            ThresholdKey::Memory => self.memory,
            ThresholdKey::Swap => self.swap,
            ThresholdKey::Gpu => self.gpu,
            ThresholdKey::GpuMemory => self.gpu_memory,
            ThresholdKey::Temperature => self.temperature,
            ThresholdKey::DiskIo => self.disk_io,
            ThresholdKey::NetworkIo => self.network_io,
        }
    }

    /// Sets a threshold, rejecting values outside the key's range
    pub fn set(&mut self, key: ThresholdKey, value: f64) -> ConfigResult<()> {
        check(key, value)?;
        *self.slot(key) = value;
        Ok(())
    }

    /// Builder-style [`ThresholdConfig::set`]
    pub fn with(mut self, key: ThresholdKey, value: f64) -> ConfigResult<Self> {
        self.set(key, value)?;
        Ok(self)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        ThresholdKey::ALL
            .into_iter()
            .try_for_each(|key| check(key, self.get(key)))
    }

    /// Merges a persisted flat record over the defaults, field by field
    ///
    /// Unknown keys are ignored, missing or non-numeric keys keep their
    /// default, and out-of-range numbers are clamped into range.
    pub fn merged_over_defaults(record: &Map<String, Value>) -> Self {
        let mut config = Self::default();

        for key in ThresholdKey::ALL {
            let Some(value) = record.get(key.as_str()) else {
                continue;
            };
            match value.as_f64().filter(|v| v.is_finite()) {
                Some(v) => {
                    let (min, max) = key.range();
                    let clamped = v.clamp(min, max);
                    if clamped != v {
                        tracing::warn!(
                            "Stored threshold {} = {} outside {}..={}, clamped to {}",
                            key, v, min, max, clamped
                        );
                    }
                    *config.slot(key) = clamped;
                }
                None => {
                    tracing::warn!("Stored threshold {} is not a number, using default", key);
                }
            }
        }

        config
    }

    /// Flat key to number record for persistence
    pub fn to_record(&self) -> Map<String, Value> {
        ThresholdKey::ALL
            .into_iter()
            .map(|key| (key.as_str().to_string(), Value::from(self.get(key))))
            .collect()
    }

    fn slot(&mut self, key: ThresholdKey) -> &mut f64 {
        match key {
            ThresholdKey::Cpu => &mut self.cpu,
            ThresholdKey::Memory => &mut self.memory,
            ThresholdKey::Swap => &mut self.swap,
            ThresholdKey::Gpu => &mut self.gpu,
            ThresholdKey::GpuMemory => &mut self.gpu_memory,
            ThresholdKey::Temperature => &mut self.temperature,
            ThresholdKey::DiskIo => &mut self.disk_io,
            ThresholdKey::NetworkIo => &mut self.network_io,
        }
    }
}

fn check(key: ThresholdKey, value: f64) -> ConfigResult<()> {
    if !value.is_finite() {
        return Err(ConfigError::NotFinite {
            key: key.to_string(),
        });
    }
    let (min, max) = key.range();
    if value < min || value > max {
        return Err(ConfigError::OutOfRange {
            key: key.to_string(),
            value,
            min,
            max,
        });
    }
    Ok(())
}

/// The live threshold configuration shared between the editor and the sampling loop
///
/// Updates are validated, persisted best-effort, then swapped in as a whole so
/// a tick in progress keeps the configuration it started with.
#[derive(Clone)]
pub struct SharedThresholds {
    current: Arc<watch::Sender<Arc<ThresholdConfig>>>,
    store: Arc<dyn ThresholdStore>,
}

impl SharedThresholds {
    /// Loads the persisted configuration from `store`
    pub fn load(store: Arc<dyn ThresholdStore>) -> Self {
        let config = store.load();
        let (tx, _rx) = watch::channel(Arc::new(config));
        Self {
            current: Arc::new(tx),
            store,
        }
    }

    pub fn current(&self) -> Arc<ThresholdConfig> {
        self.current.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<ThresholdConfig>> {
        self.current.subscribe()
    }

    /// Validates, saves and publishes a whole new configuration
    pub fn update(&self, config: ThresholdConfig) -> ConfigResult<()> {
        self.replace(|_| Ok(config))?;
        tracing::info!("Threshold configuration updated");
        Ok(())
    }

    /// Changes a single threshold
    pub fn set(&self, key: ThresholdKey, value: f64) -> ConfigResult<()> {
        self.replace(|current| current.clone().with(key, value))?;
        tracing::info!("Threshold {} set to {}", key, value);
        Ok(())
    }

    /// Restores every threshold to its default
    pub fn reset(&self) {
        if self.replace(|_| Ok(ThresholdConfig::default())).is_ok() {
            tracing::info!("Threshold configuration reset to defaults");
        }
    }

    /// Derives, validates, saves and publishes the next configuration while
    /// holding the channel's write lock, so concurrent edits never interleave
    fn replace<F>(&self, edit: F) -> ConfigResult<()>
    where
        F: FnOnce(&ThresholdConfig) -> ConfigResult<ThresholdConfig>,
    {
        let mut outcome = Ok(());
        self.current.send_if_modified(|current| {
            let next = match edit(current).and_then(|next| next.validate().map(|()| next)) {
                Ok(next) => next,
                Err(e) => {
                    outcome = Err(e);
                    return false;
                }
            };
            self.store.save(&next);
            *current = Arc::new(next);
            true
        });
        outcome
    }
}
