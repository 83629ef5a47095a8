use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;
use vitals_sampler::{AlertEvent, AlertSink, MetricsSnapshot, MetricsSource, SourceError};

/// Mock source replaying a script of results, one per fetch
///
/// Once the script runs out every fetch fails with `Unavailable`.
#[derive(Default)]
pub struct ScriptedSource {
    script: Mutex<VecDeque<Result<MetricsSnapshot, SourceError>>>,
    fetches: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(script: Vec<Result<MetricsSnapshot, SourceError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fetches: AtomicUsize::new(0),
        })
    }

    pub fn from_snapshots(snapshots: Vec<MetricsSnapshot>) -> Arc<Self> {
        Self::new(snapshots.into_iter().map(Ok).collect())
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().map(|script| script.len()).unwrap_or(0)
    }
}

#[async_trait]
impl MetricsSource for ScriptedSource {
    async fn fetch(&self) -> Result<MetricsSnapshot, SourceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .map_err(|_| SourceError::unavailable("script lock poisoned"))?
            .pop_front()
            .unwrap_or_else(|| Err(SourceError::unavailable("script exhausted")))
    }
}

/// Mock source whose fetches block until the test opens the gate
pub struct GatedSource {
    gate: Arc<Notify>,
    started: Arc<Notify>,
    snapshot: MetricsSnapshot,
}

impl GatedSource {
    pub fn new(snapshot: MetricsSnapshot) -> Arc<Self> {
        Arc::new(Self {
            gate: Arc::new(Notify::new()),
            started: Arc::new(Notify::new()),
            snapshot,
        })
    }

    /// Resolves once a fetch is waiting at the gate
    pub async fn wait_for_fetch(&self) {
        self.started.notified().await;
    }

    /// Lets one pending or future fetch complete
    pub fn open(&self) {
        self.gate.notify_one();
    }
}

#[async_trait]
impl MetricsSource for GatedSource {
    async fn fetch(&self) -> Result<MetricsSnapshot, SourceError> {
        self.started.notify_one();
        self.gate.notified().await;
        Ok(self.snapshot.clone())
    }
}

/// Mock source that always fails with the same error
pub struct FailingSource {
    error: SourceError,
}

impl FailingSource {
    pub fn new(error: SourceError) -> Arc<Self> {
        Arc::new(Self { error })
    }

    pub fn unavailable() -> Arc<Self> {
        Self::new(SourceError::unavailable("provider not running"))
    }
}

#[async_trait]
impl MetricsSource for FailingSource {
    async fn fetch(&self) -> Result<MetricsSnapshot, SourceError> {
        Err(self.error.clone())
    }
}

/// Alert sink keeping every notification for later assertions
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<AlertEvent>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<AlertEvent> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }

    pub fn keys(&self) -> Vec<String> {
        self.events().into_iter().map(|event| event.key).collect()
    }
}

impl AlertSink for RecordingSink {
    fn notify(&self, event: &AlertEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_source_exhausts() {
        let source = ScriptedSource::from_snapshots(vec![MetricsSnapshot::empty()]);

        assert!(source.fetch().await.is_ok());
        assert_eq!(source.remaining(), 0);
        assert!(source.fetch().await.is_err());
        assert_eq!(source.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_gated_source_waits_for_gate() {
        let source = GatedSource::new(MetricsSnapshot::empty());
        let fetch = tokio::spawn({
            let source = source.clone();
            async move { source.fetch().await }
        });

        source.wait_for_fetch().await;
        assert!(!fetch.is_finished());
        source.open();
        assert!(fetch.await.unwrap().is_ok());
    }
}
