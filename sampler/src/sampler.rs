//! The metrics sampling loop
//!
//! A [`SamplingLoop`] polls its [`MetricsSource`] on a fixed interval, feeds
//! each snapshot into the rolling histories and the alert evaluator, and
//! broadcasts the combined view to subscribers. Ticks never overlap: a slow
//! fetch delays the next tick instead of running beside it.
//!
//! ```text
//! Idle -> Polling -> Published | Failed -> Polling -> ...
//!                       stop() from any state -> Stopped
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::alerts::{AlertEvaluator, AlertEvent, AlertSink};
use crate::config::SamplerConfig;
use crate::error::{ConfigResult, SamplerError, SourceError};
use crate::history::MetricHistories;
use crate::snapshot::MetricsSnapshot;
use crate::source::MetricsSource;
use crate::thresholds::{SharedThresholds, ThresholdConfig};

/// Sampling loop lifecycle state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "lowercase")]
pub enum LoopState {
    Idle,
    Polling,
    Published,
    /// Last fetch failed; metrics are unavailable until a tick succeeds
    Failed(String),
    Stopped,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopState::Idle => write!(f, "idle"),
            LoopState::Polling => write!(f, "polling"),
            LoopState::Published => write!(f, "published"),
            LoopState::Failed(message) => write!(f, "failed: {}", message),
            LoopState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Combined view published after every successful tick
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Publication {
    pub snapshot: MetricsSnapshot,
    /// Read-only copies of every rolling history, oldest sample first
    pub histories: BTreeMap<String, Vec<f64>>,
    /// Alerts that activated on this tick
    pub alerts: Vec<AlertEvent>,
    /// Every alert key active after this tick
    pub active_alerts: Vec<String>,
}

/// Message delivered to loop subscribers once per tick
#[derive(Debug, Clone)]
pub enum SamplerUpdate {
    Published(Arc<Publication>),
    Failed { message: String, at: DateTime<Utc> },
}

/// Tick counters since the loop was created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SamplerStats {
    /// Ticks fully processed, successful or not
    pub ticks: u64,
    pub failures: u64,
    pub alerts_emitted: u64,
}

#[derive(Debug, Default)]
struct Counters {
    ticks: AtomicU64,
    failures: AtomicU64,
    alerts_emitted: AtomicU64,
}

/// History and alert state mutated by a successful tick
///
/// This is the whole poll-evaluate step without any scheduling, so it can be
/// driven directly by callers that produce their own snapshots.
#[derive(Debug, Clone)]
pub struct SamplerCore {
    histories: MetricHistories,
    evaluator: AlertEvaluator,
}

impl SamplerCore {
    pub fn new(history_capacity: usize, hysteresis_factor: f64) -> Self {
        Self {
            histories: MetricHistories::new(history_capacity),
            evaluator: AlertEvaluator::new(hysteresis_factor),
        }
    }

    /// Records every sample of `snapshot` and evaluates it against `thresholds`
    pub fn apply(&mut self, snapshot: MetricsSnapshot, thresholds: &ThresholdConfig) -> Publication {
        for (key, value) in snapshot.samples() {
            self.histories.record(&key, value);
        }
        let alerts = self.evaluator.evaluate(&snapshot, thresholds);

        Publication {
            histories: self.histories.to_values(),
            active_alerts: self.evaluator.active_keys(),
            snapshot,
            alerts,
        }
    }

    pub fn histories(&self) -> &MetricHistories {
        &self.histories
    }

    pub fn evaluator(&self) -> &AlertEvaluator {
        &self.evaluator
    }
}

struct Shared {
    source: Arc<dyn MetricsSource>,
    thresholds: SharedThresholds,
    interval: Duration,
    core: Mutex<SamplerCore>,
    sinks: Vec<Arc<dyn AlertSink>>,
    updates: broadcast::Sender<SamplerUpdate>,
    state: watch::Sender<LoopState>,
    cancel: CancellationToken,
    generation: AtomicU64,
    counters: Counters,
}

/// Periodic sampler owning all history and alert state
pub struct SamplingLoop {
    shared: Arc<Shared>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SamplingLoop {
    pub fn new(
        source: Arc<dyn MetricsSource>,
        thresholds: SharedThresholds,
        config: &SamplerConfig,
    ) -> ConfigResult<Self> {
        Self::with_sinks(source, thresholds, config, Vec::new())
    }

    /// Creates a loop that forwards every newly activated alert to `sinks`
    ///
    /// Fails when `config` does not pass [`SamplerConfig::validate`].
    pub fn with_sinks(
        source: Arc<dyn MetricsSource>,
        thresholds: SharedThresholds,
        config: &SamplerConfig,
        sinks: Vec<Arc<dyn AlertSink>>,
    ) -> ConfigResult<Self> {
        config.validate()?;

        let (updates, _) = broadcast::channel(config.channel_capacity);
        let (state, _) = watch::channel(LoopState::Idle);

        Ok(Self {
            shared: Arc::new(Shared {
                source,
                thresholds,
                interval: config.interval(),
                core: Mutex::new(SamplerCore::new(
                    config.history_capacity,
                    config.hysteresis_factor,
                )),
                sinks,
                updates,
                state,
                cancel: CancellationToken::new(),
                generation: AtomicU64::new(0),
                counters: Counters::default(),
            }),
            task: Mutex::new(None),
        })
    }

    /// Starts polling: the first tick runs immediately, then one per interval
    ///
    /// Must be called from within a tokio runtime. A stopped loop cannot be
    /// restarted; create a new one instead.
    pub fn start(&self) -> Result<(), SamplerError> {
        let mut task = lock(&self.task);

        if self.shared.cancel.is_cancelled() {
            return Err(SamplerError::Stopped);
        }
        if task.is_some() {
            return Err(SamplerError::AlreadyRunning);
        }

        let generation = self.shared.generation.load(Ordering::SeqCst);
        let shared = self.shared.clone();
        *task = Some(tokio::spawn(async move {
            shared.run(generation).await;
        }));

        tracing::info!(
            "Sampling loop started with a {}ms interval",
            self.shared.interval.as_millis()
        );
        Ok(())
    }

    /// Cancels the pending tick and any in-flight fetch, then waits for the loop to exit
    ///
    /// Nothing is recorded or published after this returns. Calling it again
    /// is a no-op.
    pub async fn stop(&self) {
        self.shared.cancel.cancel();
        {
            // Serializes with a tick that is already applying its result
            let _core = lock(&self.shared.core);
            self.shared.generation.fetch_add(1, Ordering::SeqCst);
        }

        let stopped = self.shared.state.send_if_modified(|state| {
            if *state == LoopState::Stopped {
                false
            } else {
                *state = LoopState::Stopped;
                true
            }
        });

        let task = lock(&self.task).take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                if e.is_panic() {
                    tracing::warn!("Sampling task panicked: {}", e);
                }
            }
        }

        if stopped {
            tracing::info!("Sampling loop stopped");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SamplerUpdate> {
        self.shared.updates.subscribe()
    }

    pub fn state(&self) -> LoopState {
        self.shared.state.borrow().clone()
    }

    pub fn watch_state(&self) -> watch::Receiver<LoopState> {
        self.shared.state.subscribe()
    }

    pub fn is_running(&self) -> bool {
        lock(&self.task).is_some() && !self.shared.cancel.is_cancelled()
    }

    pub fn stats(&self) -> SamplerStats {
        let counters = &self.shared.counters;
        SamplerStats {
            ticks: counters.ticks.load(Ordering::Relaxed),
            failures: counters.failures.load(Ordering::Relaxed),
            alerts_emitted: counters.alerts_emitted.load(Ordering::Relaxed),
        }
    }

    /// Copy of one metric's rolling history
    pub fn history(&self, key: &str) -> Option<Vec<f64>> {
        lock(&self.shared.core)
            .histories()
            .get(key)
            .map(|history| history.values())
    }

    pub fn histories(&self) -> BTreeMap<String, Vec<f64>> {
        lock(&self.shared.core).histories().to_values()
    }

    pub fn active_alerts(&self) -> Vec<String> {
        lock(&self.shared.core).evaluator().active_keys()
    }

    pub fn thresholds(&self) -> &SharedThresholds {
        &self.shared.thresholds
    }
}

impl Drop for SamplingLoop {
    fn drop(&mut self) {
        self.shared.cancel.cancel();
    }
}

impl Shared {
    async fn run(&self, generation: u64) {
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            self.transition(LoopState::Polling);

            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    tracing::debug!("Dropping in-flight fetch on shutdown");
                    break;
                }
                result = self.source.fetch() => result,
            };

            if !self.complete_tick(generation, result) {
                break;
            }
        }

        tracing::debug!("Sampling task exited");
    }

    /// Applies one fetch result, returning false when it arrived after shutdown
    ///
    /// The core lock is held until the result is published, so `stop()` either
    /// waits for the whole tick or the tick sees the cancellation.
    fn complete_tick(&self, generation: u64, result: Result<MetricsSnapshot, SourceError>) -> bool {
        let mut core = lock(&self.core);
        if self.cancel.is_cancelled() || self.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!("Discarding stale fetch result");
            return false;
        }

        self.counters.ticks.fetch_add(1, Ordering::Relaxed);

        match result {
            Ok(snapshot) => {
                let thresholds = self.thresholds.current();
                let publication = core.apply(snapshot, &thresholds);

                tracing::debug!(
                    "Published snapshot with {} histories, {} active alerts",
                    publication.histories.len(),
                    publication.active_alerts.len()
                );

                for event in &publication.alerts {
                    for sink in &self.sinks {
                        sink.notify(event);
                    }
                }
                self.counters
                    .alerts_emitted
                    .fetch_add(publication.alerts.len() as u64, Ordering::Relaxed);

                // No subscribers is not an error
                let _ = self.updates.send(SamplerUpdate::Published(Arc::new(publication)));
                self.transition(LoopState::Published);
            }
            Err(e) => {
                let message = e.to_string();
                tracing::warn!("Metrics fetch failed: {}", message);
                self.counters.failures.fetch_add(1, Ordering::Relaxed);

                let _ = self.updates.send(SamplerUpdate::Failed {
                    message: message.clone(),
                    at: Utc::now(),
                });
                self.transition(LoopState::Failed(message));
            }
        }

        true
    }

    /// Moves to `next` unless the loop has already stopped
    fn transition(&self, next: LoopState) {
        self.state.send_if_modified(|state| {
            if *state == LoopState::Stopped {
                return false;
            }
            *state = next;
            true
        });
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
