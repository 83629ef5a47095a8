use crate::error::Result;
use crate::output::OutputManager;
use crate::utils;
use clap::Args;
use vitals_sampler::{SamplerConfig, ThresholdKey};

#[derive(Args, Debug)]
pub struct ThresholdsArgs {
    /// Threshold action
    #[command(subcommand)]
    pub action: ThresholdsAction,
}

#[derive(clap::Subcommand, Debug)]
pub enum ThresholdsAction {
    /// Show current alert thresholds
    Show,

    /// Set a single alert threshold
    Set {
        /// Threshold key (cpu, memory, swap, gpu, gpuMemory, temperature, diskIO, networkIO)
        key: String,

        /// New threshold value
        #[arg(allow_hyphen_values = true)]
        value: f64,
    },

    /// Reset every threshold to its default
    Reset,
}

pub async fn run(args: ThresholdsArgs, config: SamplerConfig, output: OutputManager) -> Result<()> {
    let thresholds = utils::open_thresholds(&config);

    match args.action {
        ThresholdsAction::Show => output.print_thresholds(&thresholds.current()),
        ThresholdsAction::Set { key, value } => {
            let key: ThresholdKey = key.parse()?;
            thresholds.set(key, value)?;
            output.print_success(&format!("{} threshold set to {}{}", key, value, key.unit()))
        }
        ThresholdsAction::Reset => {
            thresholds.reset();
            output.print_success("Thresholds reset to defaults")
        }
    }
}
