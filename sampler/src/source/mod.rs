//! Metrics sources
//!
//! The sampling loop only depends on [`MetricsSource`]; how a snapshot is
//! obtained (OS APIs, a subprocess, IPC) stays behind the trait.

pub mod gpu;
pub mod system;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::SourceError;
use crate::snapshot::MetricsSnapshot;

pub use gpu::{GpuProbe, NoGpuProbe, NvidiaSmiProbe};
pub use system::SystemSource;

/// Supplies a snapshot of current system and GPU metrics on demand
#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn fetch(&self) -> Result<MetricsSnapshot, SourceError>;
}

#[async_trait]
impl<S: MetricsSource + ?Sized> MetricsSource for Arc<S> {
    async fn fetch(&self) -> Result<MetricsSnapshot, SourceError> {
        (**self).fetch().await
    }
}
