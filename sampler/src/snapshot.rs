//! Metrics snapshot types
//!
//! A [`MetricsSnapshot`] is produced fresh on every successful poll and is
//! never mutated afterwards; the next tick supersedes it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One immutable reading of all tracked metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Capture time
    pub timestamp: DateTime<Utc>,

    /// Global CPU usage in percent
    pub cpu_usage: f64,

    /// Memory usage in percent
    pub memory_usage: f64,

    /// Used swap in bytes
    pub swap_used: u64,

    /// Total swap in bytes, zero when no swap is configured
    pub swap_total: u64,

    pub disk_read_bytes_per_sec: f64,
    pub disk_write_bytes_per_sec: f64,
    pub network_rx_bytes_per_sec: f64,
    pub network_tx_bytes_per_sec: f64,

    /// GPU devices, keyed across ticks by [`GpuDevice::id`]
    pub gpus: Vec<GpuDevice>,
}

/// A single GPU reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuDevice {
    /// Stable device identifier
    pub id: String,

    pub name: String,

    /// Utilization in percent
    pub utilization: Option<f64>,

    /// Memory usage in percent
    pub memory_usage: Option<f64>,

    /// Temperature in degrees Celsius, absent without a sensor
    pub temperature: Option<f64>,
}

impl MetricsSnapshot {
    /// An all-zero snapshot captured now
    pub fn empty() -> Self {
        Self {
            timestamp: Utc::now(),
            cpu_usage: 0.0,
            memory_usage: 0.0,
            swap_used: 0,
            swap_total: 0,
            disk_read_bytes_per_sec: 0.0,
            disk_write_bytes_per_sec: 0.0,
            network_rx_bytes_per_sec: 0.0,
            network_tx_bytes_per_sec: 0.0,
            gpus: Vec::new(),
        }
    }

    /// Swap usage in percent; zero when no swap is configured
    pub fn swap_usage(&self) -> f64 {
        if self.swap_total == 0 {
            return 0.0;
        }
        self.swap_used as f64 / self.swap_total as f64 * 100.0
    }

    /// Combined disk throughput in bytes per second
    pub fn disk_io_bytes_per_sec(&self) -> f64 {
        self.disk_read_bytes_per_sec + self.disk_write_bytes_per_sec
    }

    /// Combined network throughput in bytes per second
    pub fn network_io_bytes_per_sec(&self) -> f64 {
        self.network_rx_bytes_per_sec + self.network_tx_bytes_per_sec
    }

    /// Every sample this snapshot contributes to rolling history, keyed by history key
    ///
    /// Missing optional per-device values are skipped rather than recorded as zero.
    pub fn samples(&self) -> Vec<(String, f64)> {
        let mut samples = vec![
            ("cpu".to_string(), self.cpu_usage),
            ("memory".to_string(), self.memory_usage),
            ("swap".to_string(), self.swap_usage()),
            ("diskRead".to_string(), self.disk_read_bytes_per_sec),
            ("diskWrite".to_string(), self.disk_write_bytes_per_sec),
            ("networkRx".to_string(), self.network_rx_bytes_per_sec),
            ("networkTx".to_string(), self.network_tx_bytes_per_sec),
        ];

        for gpu in &self.gpus {
            if let Some(utilization) = gpu.utilization {
                samples.push((format!("gpu-{}", gpu.id), utilization));
            }
            if let Some(memory) = gpu.memory_usage {
                samples.push((format!("gpuMemory-{}", gpu.id), memory));
            }
            if let Some(temperature) = gpu.temperature {
                samples.push((format!("temp-{}", gpu.id), temperature));
            }
        }

        samples
    }
}

impl GpuDevice {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: format!("GPU {}", id),
            id,
            utilization: None,
            memory_usage: None,
            temperature: None,
        }
    }
}
