//! GPU readings via `nvidia-smi`
//!
//! A machine without the tool simply has no GPUs; fields the driver reports
//! as `[N/A]` become missing optional values.

use std::io;
use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::SourceError;
use crate::snapshot::GpuDevice;

const QUERY_FIELDS: &str = "index,name,utilization.gpu,memory.used,memory.total,temperature.gpu";

/// Blocking GPU reader, called from the system source's blocking task
pub trait GpuProbe: Send + Sync {
    fn probe(&self) -> Result<Vec<GpuDevice>, SourceError>;
}

/// Probe for hosts without GPU support
#[derive(Debug, Default, Clone, Copy)]
pub struct NoGpuProbe;

impl GpuProbe for NoGpuProbe {
    fn probe(&self) -> Result<Vec<GpuDevice>, SourceError> {
        Ok(Vec::new())
    }
}

/// Reads NVIDIA GPUs through the `nvidia-smi` query interface
#[derive(Debug)]
pub struct NvidiaSmiProbe {
    command: String,
    missing: AtomicBool,
}

impl NvidiaSmiProbe {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            missing: AtomicBool::new(false),
        }
    }
}

impl Default for NvidiaSmiProbe {
    fn default() -> Self {
        Self::new("nvidia-smi")
    }
}

impl GpuProbe for NvidiaSmiProbe {
    fn probe(&self) -> Result<Vec<GpuDevice>, SourceError> {
        if self.missing.load(Ordering::Relaxed) {
            return Ok(Vec::new());
        }

        let output = Command::new(&self.command)
            .arg(format!("--query-gpu={}", QUERY_FIELDS))
            .arg("--format=csv,noheader,nounits")
            .output();

        let output = match output {
            Ok(output) => output,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::info!("{} not found, GPU metrics disabled", self.command);
                self.missing.store(true, Ordering::Relaxed);
                return Ok(Vec::new());
            }
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                return Err(SourceError::PermissionDenied {
                    reason: format!("{}: {}", self.command, e),
                });
            }
            Err(e) => return Err(SourceError::unavailable(format!("{}: {}", self.command, e))),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SourceError::unavailable(format!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            )));
        }

        Ok(parse_query_output(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Parses `--format=csv,noheader,nounits` output, skipping malformed lines
pub fn parse_query_output(output: &str) -> Vec<GpuDevice> {
    output.lines().filter_map(parse_line).collect()
}

fn parse_line(line: &str) -> Option<GpuDevice> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() != 6 || fields[0].is_empty() {
        if !line.trim().is_empty() {
            tracing::debug!("Skipping malformed nvidia-smi line: {}", line);
        }
        return None;
    }

    let memory_usage = match (number(fields[3]), number(fields[4])) {
        (Some(used), Some(total)) if total > 0.0 => Some(used / total * 100.0),
        _ => None,
    };

    Some(GpuDevice {
        id: fields[0].to_string(),
        name: fields[1].to_string(),
        utilization: number(fields[2]),
        memory_usage,
        temperature: number(fields[5]),
    })
}

fn number(field: &str) -> Option<f64> {
    field.parse::<f64>().ok().filter(|v| v.is_finite())
}
