use crate::error::Result;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use vitals_sampler::config::default_config_dir;
use vitals_sampler::{
    FileThresholdStore, MemoryThresholdStore, SamplerConfig, SharedThresholds, ThresholdStore,
};

/// Name of the sampler configuration file inside the config directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Get the vitals configuration directory
///
/// `VITALS_CONFIG_DIR` overrides the platform default.
pub fn get_config_dir() -> Option<PathBuf> {
    env::var_os("VITALS_CONFIG_DIR")
        .map(PathBuf::from)
        .or_else(default_config_dir)
}

/// Get the default configuration file path
pub fn get_config_file() -> Option<PathBuf> {
    get_config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

/// Loads the sampler configuration from an explicit path, or the default file when present
pub fn load_config(explicit: Option<&Path>) -> Result<SamplerConfig> {
    let mut config = match explicit {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            SamplerConfig::load(Some(path))?
        }
        None => match get_config_file().filter(|path| path.exists()) {
            Some(path) => {
                info!("Loading configuration from: {}", path.display());
                SamplerConfig::load(Some(&path))?
            }
            None => {
                debug!("No configuration file found, using defaults and environment");
                SamplerConfig::load(None)?
            }
        },
    };

    // Keep thresholds next to an overridden config directory
    if config.thresholds_path.is_none() {
        if let Some(dir) = env::var_os("VITALS_CONFIG_DIR") {
            config.thresholds_path =
                Some(PathBuf::from(dir).join(vitals_sampler::config::THRESHOLDS_FILE_NAME));
        }
    }

    Ok(config)
}

/// Opens the persisted thresholds, falling back to a session-only store without a config path
pub fn open_thresholds(config: &SamplerConfig) -> SharedThresholds {
    let store: Arc<dyn ThresholdStore> = match config.thresholds_path() {
        Some(path) => {
            debug!("Using thresholds at {}", path.display());
            Arc::new(FileThresholdStore::new(path))
        }
        None => {
            warn!("No configuration directory available, threshold changes will not persist");
            Arc::new(MemoryThresholdStore::default())
        }
    };
    SharedThresholds::load(store)
}
