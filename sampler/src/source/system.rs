//! Default metrics source backed by `sysinfo`
//!
//! Disk and network rates are computed from the byte counters accumulated
//! between two consecutive fetches, so the first reading after construction
//! covers the time since the source was created.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use sysinfo::{Networks, System};

use super::gpu::{GpuProbe, NoGpuProbe, NvidiaSmiProbe};
use super::MetricsSource;
use crate::config::GpuConfig;
use crate::error::SourceError;
use crate::snapshot::{GpuDevice, MetricsSnapshot};

/// Host metrics source: CPU, memory, swap, disk and network via sysinfo, GPUs via a probe
#[derive(Clone)]
pub struct SystemSource {
    probe: Arc<Mutex<SystemProbe>>,
}

struct SystemProbe {
    system: System,
    networks: Networks,
    last_refresh: Instant,
    gpu: Box<dyn GpuProbe>,
    gpu_failing: bool,
}

impl SystemSource {
    pub fn new(gpu_config: &GpuConfig) -> Self {
        let gpu: Box<dyn GpuProbe> = if gpu_config.enabled {
            Box::new(NvidiaSmiProbe::new(gpu_config.command.clone()))
        } else {
            Box::new(NoGpuProbe)
        };
        Self::with_gpu_probe(gpu)
    }

    pub fn with_gpu_probe(gpu: Box<dyn GpuProbe>) -> Self {
        let mut system = System::new();
        // Prime the counters so the first fetch has a baseline for CPU usage
        system.refresh_cpu();
        system.refresh_memory();
        system.refresh_processes();

        Self {
            probe: Arc::new(Mutex::new(SystemProbe {
                system,
                networks: Networks::new_with_refreshed_list(),
                last_refresh: Instant::now(),
                gpu,
                gpu_failing: false,
            })),
        }
    }
}

impl SystemProbe {
    fn sample(&mut self) -> MetricsSnapshot {
        let elapsed = self.last_refresh.elapsed().as_secs_f64().max(0.001);
        self.last_refresh = Instant::now();

        self.system.refresh_cpu();
        self.system.refresh_memory();
        self.system.refresh_processes();
        self.networks.refresh();

        let total_memory = self.system.total_memory();
        let memory_usage = if total_memory == 0 {
            0.0
        } else {
            self.system.used_memory() as f64 / total_memory as f64 * 100.0
        };

        let (read_bytes, written_bytes) = self
            .system
            .processes()
            .values()
            .map(|process| process.disk_usage())
            .fold((0u64, 0u64), |(read, written), usage| {
                (read + usage.read_bytes, written + usage.written_bytes)
            });

        let (received, transmitted) = self
            .networks
            .iter()
            .fold((0u64, 0u64), |(rx, tx), (_name, data)| {
                (rx + data.received(), tx + data.transmitted())
            });

        let gpus = self.read_gpus();

        MetricsSnapshot {
            timestamp: Utc::now(),
            cpu_usage: self.system.global_cpu_info().cpu_usage() as f64,
            memory_usage,
            swap_used: self.system.used_swap(),
            swap_total: self.system.total_swap(),
            disk_read_bytes_per_sec: read_bytes as f64 / elapsed,
            disk_write_bytes_per_sec: written_bytes as f64 / elapsed,
            network_rx_bytes_per_sec: received as f64 / elapsed,
            network_tx_bytes_per_sec: transmitted as f64 / elapsed,
            gpus,
        }
    }

    /// GPU readings, or none while the GPU query fails
    fn read_gpus(&mut self) -> Vec<GpuDevice> {
        match self.gpu.probe() {
            Ok(gpus) => {
                if self.gpu_failing {
                    tracing::info!("GPU query recovered, {} devices", gpus.len());
                    self.gpu_failing = false;
                }
                gpus
            }
            Err(e) => {
                if self.gpu_failing {
                    tracing::debug!("GPU query still failing: {}", e);
                } else {
                    tracing::warn!("GPU query failed, reporting host metrics only: {}", e);
                    self.gpu_failing = true;
                }
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl MetricsSource for SystemSource {
    async fn fetch(&self) -> Result<MetricsSnapshot, SourceError> {
        let probe = self.probe.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = probe
                .lock()
                .map_err(|_| SourceError::unavailable("system probe lock poisoned"))?;
            Ok(guard.sample())
        })
        .await
        .map_err(|e| SourceError::unavailable(format!("sampling task failed: {}", e)))?
    }
}
