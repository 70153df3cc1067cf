use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};
use validator::Validate;

use portvakt_config::{ConfigError, PortvaktConfig, TelemetryConfig};
use portvakt_engine::{run_production_mode, run_replay_mode};
use portvakt_telemetry::{EventLogger, MetricsRecorder};

type CommandResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Cli {
    /// Configuration file; defaults to config/portvakt.yaml plus PORTVAKT_* variables
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Monitor live traffic and block addresses with repeated failed logins
    Run(RunArgs),
    /// Run a saved capture text file through the monitor
    Replay(ReplayArgs),
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Service port to monitor
    #[arg(short, long)]
    pub port: Option<u16>,
    /// Failed attempts before an address is blocked
    #[arg(short, long)]
    pub threshold: Option<u32>,
    /// Capture interface
    #[arg(short, long)]
    pub interface: Option<String>,
    /// Log blocks instead of applying them
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ReplayArgs {
    /// File containing `tcpdump -nn -A` output
    pub file: PathBuf,
    /// Failed attempts before an address is blocked
    #[arg(short, long)]
    pub threshold: Option<u32>,
    /// Apply blocks with the configured firewall instead of logging them
    #[arg(long)]
    pub enforce: bool,
}

pub async fn run_command(cli: Cli) -> CommandResult {
    let config = match prepare_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            EventLogger::init(&TelemetryConfig::default().log_level);
            error!("Invalid configuration: {e}");
            return Err(e.into());
        }
    };

    EventLogger::init(&config.telemetry.log_level);
    let metrics = MetricsRecorder::new()?;

    let result = match cli.command {
        Commands::Run(_) => run_production_mode(config, metrics).await.map(|_| ()),
        Commands::Replay(args) => {
            let summary = run_replay_mode(&args.file, config, args.enforce, metrics.clone()).await;
            summary.map(|summary| {
                info!(?summary, "Replay finished");
                if let Ok(text) = metrics.gather_metrics() {
                    println!("{text}");
                }
            })
        }
    };

    if let Err(e) = &result {
        error!("Monitoring terminated: {e}");
    }
    result.map_err(Into::into)
}

fn prepare_config(cli: &Cli) -> Result<PortvaktConfig, ConfigError> {
    let mut config = load_config(cli.config.as_ref())?;
    apply_overrides(&mut config, &cli.command);
    config.validate()?;
    Ok(config)
}

fn load_config(path: Option<&PathBuf>) -> Result<PortvaktConfig, ConfigError> {
    match path {
        Some(path) => PortvaktConfig::load_from_path(path),
        None => PortvaktConfig::load(),
    }
}

/// Command-line flags take precedence over every configuration layer.
fn apply_overrides(config: &mut PortvaktConfig, command: &Commands) {
    match command {
        Commands::Run(args) => {
            if let Some(port) = args.port {
                config.monitor.port = port;
            }
            if let Some(threshold) = args.threshold {
                config.monitor.failure_threshold = threshold;
            }
            if let Some(interface) = &args.interface {
                config.capture.interface = interface.clone();
            }
            if args.dry_run {
                config.prevention.firewall.dry_run = true;
            }
        }
        Commands::Replay(args) => {
            if let Some(threshold) = args.threshold {
                config.monitor.failure_threshold = threshold;
            }
        }
    }
}
