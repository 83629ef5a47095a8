//! Threshold persistence
//!
//! Persistence is best-effort: the in-memory configuration stays
//! authoritative for the running session, so load falls back to defaults and
//! save only logs when the storage medium misbehaves.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::{Map, Value};

use crate::error::{PersistenceError, PersistenceResult};
use crate::thresholds::ThresholdConfig;

/// Fixed key the threshold record is stored under
pub const THRESHOLDS_STORAGE_KEY: &str = "thresholds";

/// Storage medium for the threshold configuration
pub trait ThresholdStore: Send + Sync {
    /// Persisted values merged over defaults; defaults when storage is absent or corrupt
    fn load(&self) -> ThresholdConfig;

    /// Persists synchronously, logging and swallowing failures
    fn save(&self, config: &ThresholdConfig);
}

/// JSON document on disk holding records under fixed storage keys
#[derive(Debug, Clone)]
pub struct FileThresholdStore {
    path: PathBuf,
}

impl FileThresholdStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the stored threshold record, `None` when nothing was saved yet
    pub fn try_load(&self) -> PersistenceResult<Option<Map<String, Value>>> {
        let Some(document) = self.read_document()? else {
            return Ok(None);
        };

        match document.get(THRESHOLDS_STORAGE_KEY) {
            None => Ok(None),
            Some(Value::Object(record)) => Ok(Some(record.clone())),
            Some(other) => Err(PersistenceError::Corrupt {
                reason: format!("'{}' is not an object: {}", THRESHOLDS_STORAGE_KEY, other),
            }),
        }
    }

    /// Writes the threshold record, keeping any other records in the document
    pub fn try_save(&self, config: &ThresholdConfig) -> PersistenceResult<()> {
        let mut document = match self.read_document() {
            Ok(Some(document)) => document,
            Ok(None) => Map::new(),
            Err(e) => {
                tracing::warn!("Replacing unreadable settings document {}: {}", self.path.display(), e);
                Map::new()
            }
        };
        document.insert(
            THRESHOLDS_STORAGE_KEY.to_string(),
            Value::Object(config.to_record()),
        );

        let content = serde_json::to_string_pretty(&Value::Object(document)).map_err(|e| {
            PersistenceError::Corrupt {
                reason: e.to_string(),
            }
        })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.write_error(e))?;
        }

        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, content).map_err(|e| self.write_error(e))?;
        fs::rename(&tmp_path, &self.path).map_err(|e| self.write_error(e))?;
        Ok(())
    }

    fn read_document(&self) -> PersistenceResult<Option<Map<String, Value>>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(PersistenceError::Read {
                    path: self.path.display().to_string(),
                    source: e,
                })
            }
        };

        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(document)) => Ok(Some(document)),
            Ok(_) => Err(PersistenceError::Corrupt {
                reason: "settings document is not a JSON object".to_string(),
            }),
            Err(e) => Err(PersistenceError::Corrupt {
                reason: e.to_string(),
            }),
        }
    }

    fn write_error(&self, source: io::Error) -> PersistenceError {
        PersistenceError::Write {
            path: self.path.display().to_string(),
            source,
        }
    }
}

impl ThresholdStore for FileThresholdStore {
    fn load(&self) -> ThresholdConfig {
        match self.try_load() {
            Ok(Some(record)) => {
                tracing::debug!("Loaded thresholds from {}", self.path.display());
                ThresholdConfig::merged_over_defaults(&record)
            }
            Ok(None) => {
                tracing::debug!("No stored thresholds at {}, using defaults", self.path.display());
                ThresholdConfig::default()
            }
            Err(e) => {
                tracing::warn!("Failed to load thresholds, using defaults: {}", e);
                ThresholdConfig::default()
            }
        }
    }

    fn save(&self, config: &ThresholdConfig) {
        if let Err(e) = self.try_save(config) {
            tracing::warn!("Failed to save thresholds: {}", e);
        }
    }
}

/// Process-local store, used when no settings path is available and in tests
#[derive(Debug, Default)]
pub struct MemoryThresholdStore {
    record: Mutex<Option<Map<String, Value>>>,
}

impl MemoryThresholdStore {
    /// Store pre-populated with a raw record, as if written by another version
    pub fn with_record(record: Map<String, Value>) -> Self {
        Self {
            record: Mutex::new(Some(record)),
        }
    }
}

impl ThresholdStore for MemoryThresholdStore {
    fn load(&self) -> ThresholdConfig {
        match self.record.lock() {
            Ok(guard) => guard
                .as_ref()
                .map(ThresholdConfig::merged_over_defaults)
                .unwrap_or_default(),
            Err(_) => {
                tracing::warn!("Threshold store lock poisoned, using defaults");
                ThresholdConfig::default()
            }
        }
    }

    fn save(&self, config: &ThresholdConfig) {
        match self.record.lock() {
            Ok(mut guard) => *guard = Some(config.to_record()),
            Err(_) => tracing::warn!("Threshold store lock poisoned, save skipped"),
        }
    }
}
