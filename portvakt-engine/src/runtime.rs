// portvakt-engine/src/runtime.rs

/*!
# Runtime Engine

Entry points shared by frontends: live monitoring of a capture process, and
replay of saved capture text through the same monitor.
*/

use std::path::Path;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

use portvakt_capture::{CaptureCommand, CaptureTerminator, LineReader};
use portvakt_config::PortvaktConfig;
use portvakt_detection::FailureCounters;
use portvakt_prevention::{build_firewall, BlockingAction, DryRunFirewall};
use portvakt_telemetry::MetricsRecorder;

use crate::engine::{EngineError, FailureMonitor, RunSummary};

/// Monitors live traffic until the capture stream ends, fails, or the
/// process receives a termination signal.
#[instrument(level = "info", name = "run_production_mode", skip_all, fields(port = config.monitor.port))]
pub async fn run_production_mode(
    config: PortvaktConfig,
    metrics: MetricsRecorder,
) -> Result<RunSummary, EngineError> {
    let firewall = build_firewall(&config.prevention.firewall)?;
    let mut monitor = FailureMonitor::new(
        &config,
        Arc::new(FailureCounters::new()),
        firewall,
        metrics,
    )?;

    let command = CaptureCommand::from_config(&config.capture, config.monitor.port);
    let mut capture = command.spawn()?;
    spawn_shutdown_listener(Some(capture.terminator()))?;
    info!(
        "Starting monitoring on port {} (threshold {})",
        config.monitor.port, config.monitor.failure_threshold
    );

    let summary = monitor.run(&mut capture).await?;

    match capture.wait().await {
        Ok(status) if status.success() => info!("Capture process exited"),
        Ok(status) => warn!("Capture process exited with {status}"),
        Err(e) => warn!("Could not collect capture process status: {e}"),
    }
    Ok(summary)
}

/// Feeds a saved capture text file through a fresh monitor.
///
/// Blocks are only logged unless `enforce` is set, in which case the
/// configured firewall is used.
#[instrument(level = "info", name = "run_replay_mode", skip(config, metrics))]
pub async fn run_replay_mode<P: AsRef<Path> + std::fmt::Debug>(
    path: P,
    config: PortvaktConfig,
    enforce: bool,
    metrics: MetricsRecorder,
) -> Result<RunSummary, EngineError> {
    let firewall: Arc<dyn BlockingAction> = if enforce {
        build_firewall(&config.prevention.firewall)?
    } else {
        Arc::new(DryRunFirewall)
    };
    let counters = Arc::new(FailureCounters::new());
    let mut monitor = FailureMonitor::new(&config, Arc::clone(&counters), firewall, metrics)?;

    info!("Replaying capture from {:?}", path.as_ref());
    let mut source = LineReader::open(path).await?;
    let summary = monitor.run(&mut source).await?;

    info!(
        "Replay complete: {} frames, {} failures from {} addresses, {} blocks",
        summary.frames,
        summary.failures,
        counters.len(),
        summary.blocks
    );
    Ok(summary)
}

/// Spawns the task that terminates the process on SIGINT or SIGTERM.
///
/// Termination is immediate: an in-flight frame or block action is abandoned.
/// `process::exit` skips destructors, so the capture group is signalled
/// explicitly first.
pub fn spawn_shutdown_listener(
    capture: Option<CaptureTerminator>,
) -> Result<JoinHandle<()>, EngineError> {
    #[cfg(unix)]
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    Ok(tokio::spawn(async move {
        #[cfg(unix)]
        tokio::select! {
            result = tokio::signal::ctrl_c() => log_interrupt(result),
            _ = sigterm.recv() => info!("Received SIGTERM"),
        }
        #[cfg(not(unix))]
        log_interrupt(tokio::signal::ctrl_c().await);

        if let Some(capture) = capture {
            if !capture.terminate() {
                warn!("Capture process could not be signalled");
            }
        }
        info!("Monitoring stopped.");
        std::process::exit(0);
    }))
}

fn log_interrupt(result: std::io::Result<()>) {
    match result {
        Ok(()) => info!("Received SIGINT"),
        Err(e) => error!("Failed to listen for SIGINT: {e}"),
    }
}
