//! Threshold alert classification with hysteresis
//!
//! An alert activates when a metric reaches its threshold and only clears once
//! the metric drops below `threshold * hysteresis_factor`. Exactly one
//! [`AlertEvent`] is emitted per activation; clearing is silent.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::snapshot::MetricsSnapshot;
use crate::thresholds::{ThresholdConfig, ThresholdKey};

/// Fraction of the threshold a metric must fall below before its alert clears
pub const DEFAULT_HYSTERESIS_FACTOR: f64 = 0.9;

const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;

/// Alert severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// Notification for a metric entering alert state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    /// Alert key, e.g. `cpu` or `temp-0`
    pub key: String,
    pub severity: Severity,
    pub message: String,
    pub value: f64,
    pub threshold: f64,
    pub timestamp: DateTime<Utc>,
}

/// Receives alert notifications, e.g. to show a transient UI toast
pub trait AlertSink: Send + Sync {
    fn notify(&self, event: &AlertEvent);
}

/// Sink that writes every alert to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAlertSink;

impl AlertSink for TracingAlertSink {
    fn notify(&self, event: &AlertEvent) {
        match event.severity {
            Severity::Warning => tracing::warn!(key = %event.key, "{}", event.message),
            Severity::Error => tracing::error!(key = %event.key, "{}", event.message),
        }
    }
}

/// A single metric reading checked against a threshold
struct Reading {
    key: String,
    kind: ThresholdKey,
    label: String,
    value: Option<f64>,
    /// False when the metric may clear but never enter alert state
    armed: bool,
}

/// Stateful classifier holding the set of active alert keys
#[derive(Debug, Clone)]
pub struct AlertEvaluator {
    active: BTreeSet<String>,
    hysteresis_factor: f64,
}

impl Default for AlertEvaluator {
    fn default() -> Self {
        Self::new(DEFAULT_HYSTERESIS_FACTOR)
    }
}

impl AlertEvaluator {
    pub fn new(hysteresis_factor: f64) -> Self {
        Self {
            active: BTreeSet::new(),
            hysteresis_factor,
        }
    }

    /// Classifies every tracked metric in `snapshot`, returning newly activated alerts
    pub fn evaluate(
        &mut self,
        snapshot: &MetricsSnapshot,
        thresholds: &ThresholdConfig,
    ) -> Vec<AlertEvent> {
        let mut events = Vec::new();

        for reading in readings(snapshot) {
            // No value means no sensor: the alert neither triggers nor clears
            let Some(value) = reading.value else {
                continue;
            };
            let threshold = thresholds.get(reading.kind);

            if reading.armed && value >= threshold {
                if self.active.insert(reading.key.clone()) {
                    events.push(AlertEvent {
                        message: format!(
                            "{} at {:.1}{} (threshold {}{})",
                            reading.label,
                            value,
                            reading.kind.unit(),
                            threshold,
                            reading.kind.unit()
                        ),
                        severity: if reading.kind.is_temperature() {
                            Severity::Error
                        } else {
                            Severity::Warning
                        },
                        key: reading.key,
                        value,
                        threshold,
                        timestamp: snapshot.timestamp,
                    });
                }
            } else if (!reading.armed || value < threshold * self.hysteresis_factor)
                && self.active.remove(&reading.key)
            {
                tracing::debug!("Alert {} cleared at {:.1}", reading.key, value);
            }
        }

        events
    }

    pub fn is_active(&self, key: &str) -> bool {
        self.active.contains(key)
    }

    /// Currently active alert keys in sorted order
    pub fn active_keys(&self) -> Vec<String> {
        self.active.iter().cloned().collect()
    }

    pub fn hysteresis_factor(&self) -> f64 {
        self.hysteresis_factor
    }

    pub fn reset(&mut self) {
        self.active.clear();
    }
}

fn readings(snapshot: &MetricsSnapshot) -> Vec<Reading> {
    let mut readings = vec![
        Reading {
            key: "cpu".to_string(),
            kind: ThresholdKey::Cpu,
            label: "CPU usage".to_string(),
            value: Some(snapshot.cpu_usage),
            armed: true,
        },
        Reading {
            key: "memory".to_string(),
            kind: ThresholdKey::Memory,
            label: "Memory usage".to_string(),
            value: Some(snapshot.memory_usage),
            armed: true,
        },
        Reading {
            key: "swap".to_string(),
            kind: ThresholdKey::Swap,
            label: "Swap usage".to_string(),
            value: Some(snapshot.swap_usage()),
            // Without swap there is nothing to alert on, whatever the threshold
            armed: snapshot.swap_total > 0,
        },
        Reading {
            key: "diskIO".to_string(),
            kind: ThresholdKey::DiskIo,
            label: "Disk I/O".to_string(),
            value: Some(snapshot.disk_io_bytes_per_sec() / BYTES_PER_MIB),
            armed: true,
        },
        Reading {
            key: "networkIO".to_string(),
            kind: ThresholdKey::NetworkIo,
            label: "Network I/O".to_string(),
            value: Some(snapshot.network_io_bytes_per_sec() / BYTES_PER_MIB),
            armed: true,
        },
    ];

    for gpu in &snapshot.gpus {
        readings.push(Reading {
            key: format!("gpu-{}", gpu.id),
            kind: ThresholdKey::Gpu,
            label: format!("{} utilization", gpu.name),
            value: gpu.utilization,
            armed: true,
        });
        readings.push(Reading {
            key: format!("gpuMemory-{}", gpu.id),
            kind: ThresholdKey::GpuMemory,
            label: format!("{} memory", gpu.name),
            value: gpu.memory_usage,
            armed: true,
        });
        readings.push(Reading {
            key: format!("temp-{}", gpu.id),
            kind: ThresholdKey::Temperature,
            label: format!("{} temperature", gpu.name),
            value: gpu.temperature,
            armed: true,
        });
    }

    readings
}
