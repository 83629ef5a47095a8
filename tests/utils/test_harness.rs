use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use tempfile::TempDir;
use tokio::sync::broadcast::{self, error::RecvError};
use vitals_sampler::{
    AlertSink, FileThresholdStore, MetricsSource, Publication, SamplerConfig, SamplerUpdate,
    SamplingLoop, SharedThresholds,
};

/// Sampling loop fixture backed by threshold storage in a temporary directory
///
/// The directory lives as long as the harness, so thresholds saved through
/// one [`SharedThresholds`] can be reloaded through another.
pub struct TestHarness {
    temp_dir: TempDir,
    config: SamplerConfig,
    thresholds: SharedThresholds,
}

impl TestHarness {
    pub fn new() -> Result<Self> {
        Self::with_config(SamplerConfig::default())
    }

    /// Uses `config` as given except for the thresholds path
    pub fn with_config(mut config: SamplerConfig) -> Result<Self> {
        let temp_dir = TempDir::new()?;
        config.thresholds_path = Some(temp_dir.path().join("thresholds.json"));
        config.validate()?;

        let thresholds = open_thresholds(&config)?;
        Ok(Self {
            temp_dir,
            config,
            thresholds,
        })
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    pub fn thresholds(&self) -> &SharedThresholds {
        &self.thresholds
    }

    pub fn thresholds_path(&self) -> PathBuf {
        self.temp_dir.path().join("thresholds.json")
    }

    /// Loads the persisted thresholds again, as a fresh session would
    pub fn reopen_thresholds(&self) -> Result<SharedThresholds> {
        open_thresholds(&self.config)
    }

    pub fn sampling_loop(&self, source: Arc<dyn MetricsSource>) -> Result<SamplingLoop> {
        Ok(SamplingLoop::new(source, self.thresholds.clone(), &self.config)?)
    }

    pub fn sampling_loop_with_sink(
        &self,
        source: Arc<dyn MetricsSource>,
        sink: Arc<dyn AlertSink>,
    ) -> Result<SamplingLoop> {
        Ok(SamplingLoop::with_sinks(
            source,
            self.thresholds.clone(),
            &self.config,
            vec![sink],
        )?)
    }
}

fn open_thresholds(config: &SamplerConfig) -> Result<SharedThresholds> {
    let path = config
        .thresholds_path()
        .ok_or_else(|| anyhow!("no thresholds path configured"))?;
    Ok(SharedThresholds::load(Arc::new(FileThresholdStore::new(path))))
}

/// Waits for `count` publications, skipping failed ticks
///
/// Each publication must arrive within `timeout` of the previous one.
pub async fn collect_publications(
    updates: &mut broadcast::Receiver<SamplerUpdate>,
    count: usize,
    timeout: Duration,
) -> Result<Vec<Arc<Publication>>> {
    let mut publications = Vec::with_capacity(count);

    while publications.len() < count {
        match tokio::time::timeout(timeout, updates.recv()).await {
            Ok(Ok(SamplerUpdate::Published(publication))) => publications.push(publication),
            Ok(Ok(SamplerUpdate::Failed { message, .. })) => {
                tracing::debug!("Skipping failed tick: {}", message);
            }
            Ok(Err(RecvError::Lagged(skipped))) => {
                return Err(anyhow!("subscriber lagged by {} updates", skipped));
            }
            Ok(Err(RecvError::Closed)) => return Err(anyhow!("update channel closed")),
            Err(_) => {
                return Err(anyhow!(
                    "timed out after {} of {} publications",
                    publications.len(),
                    count
                ))
            }
        }
    }

    Ok(publications)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vitals_sampler::ThresholdKey;

    #[test]
    fn test_reopened_thresholds_see_saved_values() -> Result<()> {
        let harness = TestHarness::new()?;
        harness.thresholds().set(ThresholdKey::Swap, 40.0)?;

        let reopened = harness.reopen_thresholds()?;
        assert_eq!(reopened.current().get(ThresholdKey::Swap), 40.0);
        assert!(harness.thresholds_path().exists());
        Ok(())
    }
}
