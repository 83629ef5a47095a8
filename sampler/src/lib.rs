//! Vitals sampler library
//!
//! This library samples system and GPU metrics on a fixed cadence, keeps a
//! bounded rolling history per metric, and raises de-duplicated threshold
//! alerts with hysteresis.

pub mod alerts;
pub mod config;
pub mod error;
pub mod history;
pub mod sampler;
pub mod snapshot;
pub mod source;
pub mod store;
pub mod thresholds;

// Re-export commonly used types
pub use alerts::{AlertEvaluator, AlertEvent, AlertSink, Severity, TracingAlertSink};
pub use config::{GpuConfig, SamplerConfig};
pub use error::{ConfigError, PersistenceError, SamplerError, SourceError, VitalsError};
pub use history::{MetricHistories, RollingHistory};
pub use sampler::{LoopState, Publication, SamplerCore, SamplerStats, SamplerUpdate, SamplingLoop};
pub use snapshot::{GpuDevice, MetricsSnapshot};
pub use source::{MetricsSource, SystemSource};
pub use store::{FileThresholdStore, MemoryThresholdStore, ThresholdStore};
pub use thresholds::{SharedThresholds, ThresholdConfig, ThresholdKey};
