use crate::error::{CliError, Result};
use crate::output::OutputManager;
use crate::utils;
use clap::Args;
use std::path::PathBuf;
use vitals_sampler::SamplerConfig;

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Configuration action
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(clap::Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,

    /// Show configuration and threshold file paths
    Path,

    /// Write a configuration file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,

        /// Destination (defaults to the user configuration directory)
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Validate a configuration file
    Validate {
        /// Configuration file path
        file: PathBuf,
    },
}

pub async fn run(
    args: ConfigArgs,
    config_path: Option<PathBuf>,
    output: OutputManager,
) -> Result<()> {
    match args.action {
        ConfigAction::Show => {
            let config = utils::load_config(config_path.as_deref())?;
            output.print_config(&config)
        }
        ConfigAction::Path => {
            let config = utils::load_config(config_path.as_deref()).unwrap_or_default();
            let config_file = config_path.or_else(utils::get_config_file);
            output.print_key_value("config", &display_path(config_file))?;
            output.print_key_value("thresholds", &display_path(config.thresholds_path()))
        }
        ConfigAction::Init { force, file } => {
            let path = file
                .or(config_path)
                .or_else(utils::get_config_file)
                .ok_or_else(|| {
                    CliError::Validation("Unable to determine configuration directory".to_string())
                })?;

            if path.exists() && !force {
                return Err(CliError::Validation(format!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                )));
            }

            SamplerConfig::default().save(&path)?;

            output.print_success(&format!("Wrote default configuration to {}", path.display()))
        }
        ConfigAction::Validate { file } => {
            SamplerConfig::load(Some(&file))?;
            output.print_success(&format!("{} is valid", file.display()))
        }
    }
}

fn display_path(path: Option<PathBuf>) -> String {
    path.map(|p| p.display().to_string())
        .unwrap_or_else(|| "<unavailable>".to_string())
}
