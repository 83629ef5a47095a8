use crate::error::{CliError, Result};
use crate::output::{OutputFormat, OutputManager};
use crate::utils;
use clap::Args;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use vitals_sampler::{
    AlertSink, MetricsSource, SamplerConfig, SamplerUpdate, SamplingLoop, SystemSource,
    TracingAlertSink,
};

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Stop after this many ticks (runs until interrupted by default)
    #[arg(long, short = 'n')]
    pub ticks: Option<u64>,

    /// Sampling interval in milliseconds (overrides configuration)
    #[arg(long, short)]
    pub interval_ms: Option<u64>,

    /// Skip GPU probing
    #[arg(long)]
    pub no_gpu: bool,
}

pub async fn run(args: WatchArgs, mut config: SamplerConfig, output: OutputManager) -> Result<()> {
    if args.ticks == Some(0) {
        return Err(CliError::Validation("--ticks must be at least 1".to_string()));
    }
    if let Some(interval_ms) = args.interval_ms {
        config.interval_ms = interval_ms;
        config.validate()?;
    }
    if args.no_gpu {
        config.gpu.enabled = false;
    }

    let thresholds = utils::open_thresholds(&config);
    let source: Arc<dyn MetricsSource> = Arc::new(SystemSource::new(&config.gpu));

    // Table output prints alerts inline; other formats keep stdout machine-readable
    let sinks: Vec<Arc<dyn AlertSink>> = match output.format() {
        OutputFormat::Table | OutputFormat::Raw => Vec::new(),
        _ => vec![Arc::new(TracingAlertSink)],
    };

    let sampling = SamplingLoop::with_sinks(source, thresholds, &config, sinks)?;
    let mut updates = sampling.subscribe();
    sampling.start()?;

    if output.format() == OutputFormat::Csv {
        println!("timestamp,cpu,memory,swap,disk_bytes_per_sec,network_bytes_per_sec,active_alerts");
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut seen = 0u64;
    let result = loop {
        let update = tokio::select! {
            _ = &mut ctrl_c => {
                info!("Interrupted, stopping sampler");
                break Ok(());
            }
            update = updates.recv() => update,
        };

        let printed = match update {
            Ok(SamplerUpdate::Published(publication)) => output.print_tick(&publication),
            Ok(SamplerUpdate::Failed { message, .. }) => {
                output.print_warning(&format!("Metrics unavailable: {}", message))
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!("Output fell behind, skipped {} ticks", skipped);
                continue;
            }
            Err(RecvError::Closed) => break Ok(()),
        };
        if let Err(e) = printed {
            break Err(e);
        }

        seen += 1;
        if args.ticks.is_some_and(|limit| seen >= limit) {
            break Ok(());
        }
    };

    sampling.stop().await;
    let stats = sampling.stats();
    info!(
        ticks = stats.ticks,
        failures = stats.failures,
        alerts = stats.alerts_emitted,
        "Watch finished"
    );
    result
}
