use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod error;
mod output;
mod utils;

use commands::*;
use error::Result;
use output::{OutputFormat, OutputManager};

#[derive(Parser)]
#[command(name = "vitalsctl")]
#[command(about = "Vitals CLI - Sample system and GPU metrics with threshold alerts")]
#[command(version)]
#[command(long_about = "
Vitals CLI (vitalsctl) samples CPU, memory, swap, disk, network and GPU metrics,
keeps a rolling history and raises alerts when user-configured thresholds are crossed.

Examples:
  vitalsctl snapshot                       # One reading of every metric
  vitalsctl watch --ticks 30               # Sample every interval for 30 ticks
  vitalsctl watch --format json            # Stream one JSON record per tick
  vitalsctl thresholds set cpu 80          # Alert when CPU usage reaches 80%
  vitalsctl config show                    # Show the effective configuration
")]
struct Cli {
    /// Output format
    #[arg(long, global = true, value_enum, default_value = "table")]
    format: OutputFormatArg,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Configuration file path
    #[arg(long, global = true, env = "VITALS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum OutputFormatArg {
    Table,
    Json,
    Csv,
    Yaml,
    Raw,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Table => OutputFormat::Table,
            OutputFormatArg::Json => OutputFormat::Json,
            OutputFormatArg::Csv => OutputFormat::Csv,
            OutputFormatArg::Yaml => OutputFormat::Yaml,
            OutputFormatArg::Raw => OutputFormat::Raw,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Take a single reading of all metrics
    Snapshot(SnapshotArgs),

    /// Sample continuously and report alerts as they activate
    Watch(WatchArgs),

    /// Show or change alert thresholds
    Thresholds(ThresholdsArgs),

    /// Manage vitals configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(&cli);

    // Handle completion generation
    if let Commands::Completions { shell } = cli.command {
        generate_completions(shell);
        return;
    }

    // Run the command
    if let Err(e) = run_command(cli).await {
        debug!(category = e.category(), exit_code = e.exit_code(), "Command failed: {}", e);
        let error_msg = error::format_error(&e);
        eprintln!("{}", error_msg);
        process::exit(e.exit_code());
    }
}

async fn run_command(cli: Cli) -> Result<()> {
    // Create output manager
    let colored = !cli.no_color && !cli.quiet && console::Term::stdout().features().colors_supported();
    let output = OutputManager::new(OutputFormat::from(cli.format), colored);

    // Route to appropriate command
    match cli.command {
        Commands::Snapshot(args) => {
            let config = utils::load_config(cli.config.as_deref())?;
            commands::snapshot::run(args, config, output).await
        }
        Commands::Watch(args) => {
            let config = utils::load_config(cli.config.as_deref())?;
            commands::watch::run(args, config, output).await
        }
        Commands::Thresholds(args) => {
            let config = utils::load_config(cli.config.as_deref())?;
            commands::thresholds::run(args, config, output).await
        }
        Commands::Config(args) => commands::config::run(args, cli.config, output).await,
        Commands::Completions { .. } => {
            unreachable!("Completions handled earlier")
        }
    }
}

fn init_logging(cli: &Cli) {
    // Set log level based on CLI flags
    let (cli_level, sampler_level) = if cli.debug {
        ("debug", "debug")
    } else if cli.verbose {
        ("info", "info")
    } else if cli.quiet {
        ("error", "error")
    } else {
        ("warn", "info")
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("vitalsctl={},vitals_sampler={}", cli_level, sampler_level).into()
    });

    // Logs go to stderr so structured stdout output stays parseable
    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    debug!("Vitals CLI started");
}

fn generate_completions(shell: clap_complete::Shell) {
    use clap_complete::{generate, Generator};
    use std::io;

    fn print_completions<G: Generator>(gen: G, cmd: &mut clap::Command) {
        generate(gen, cmd, cmd.get_name().to_string(), &mut io::stdout());
    }

    let mut cmd = Cli::command();
    eprintln!("Generating completion file for {shell}...");
    print_completions(shell, &mut cmd);
}
