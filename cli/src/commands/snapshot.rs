use crate::error::{CliError, Result};
use crate::output::OutputManager;
use crate::utils;
use clap::Args;
use std::time::Duration;
use tracing::debug;
use vitals_sampler::{AlertEvaluator, MetricsSource, SamplerConfig, SystemSource};

#[derive(Args, Debug)]
pub struct SnapshotArgs {
    /// Skip GPU probing
    #[arg(long)]
    pub no_gpu: bool,

    /// Measurement window for CPU, disk and network rates in milliseconds
    #[arg(long, default_value = "500")]
    pub window_ms: u64,

    /// Also evaluate the reading against the configured thresholds
    #[arg(long, short)]
    pub alerts: bool,
}

pub async fn run(args: SnapshotArgs, config: SamplerConfig, output: OutputManager) -> Result<()> {
    let mut gpu = config.gpu.clone();
    if args.no_gpu {
        gpu.enabled = false;
    }
    let source = SystemSource::new(&gpu);

    // Rates and CPU usage are deltas, so give the counters a window to accumulate
    tokio::select! {
        _ = tokio::time::sleep(Duration::from_millis(args.window_ms)) => {}
        _ = tokio::signal::ctrl_c() => return Err(CliError::Cancelled),
    }

    let snapshot = source.fetch().await?;
    debug!("Captured snapshot with {} GPUs", snapshot.gpus.len());

    let alerts = if args.alerts {
        let thresholds = utils::open_thresholds(&config);
        AlertEvaluator::new(config.hysteresis_factor).evaluate(&snapshot, &thresholds.current())
    } else {
        Vec::new()
    };

    output.print_snapshot(&snapshot, &alerts)
}
