//! Failure monitor - turns capture lines into block decisions.
//!
//! Lines are grouped into frames, each completed frame is checked for an
//! authentication failure, and the offending address is counted. When an
//! address reaches the threshold the blocking action is invoked and the count
//! starts over.
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use ipnetwork::IpNetwork;
use opentelemetry::KeyValue;
use tracing::{debug, error, info, instrument, trace, warn};

use portvakt_capture::LineSource;
use portvakt_config::PortvaktConfig;
use portvakt_detection::{FailureCounters, FailureMatcher, Frame, FrameBuffer};
use portvakt_prevention::BlockingAction;
use portvakt_telemetry::{EventLogger, MetricsRecorder};

use crate::engine::{EngineError, MonitorState};

/// What processing one completed frame led to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    /// No failure marker, or no usable address.
    Ignored,
    /// Failure counted, still below the threshold.
    Counted { address: String, attempts: u32 },
    /// Threshold reached and the block succeeded.
    Blocked { address: String },
    /// Threshold reached but the block failed; `reset` tells whether the
    /// counter was cleared anyway.
    BlockFailed { address: String, reset: bool },
    /// Threshold reached by an allowlisted address; no block attempted.
    Allowlisted { address: String },
}

/// Totals for one [`FailureMonitor::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub lines: u64,
    pub frames: u64,
    pub failures: u64,
    pub blocks: u64,
    pub block_failures: u64,
    /// Bytes of an unterminated frame discarded at end of stream.
    pub dropped_bytes: usize,
}

pub struct FailureMonitor {
    port: u16,
    threshold: u32,
    frames: FrameBuffer,
    matcher: FailureMatcher,
    counters: Arc<FailureCounters>,
    firewall: Arc<dyn BlockingAction>,
    allowlist: Vec<IpNetwork>,
    reset_on_failure: bool,
    unblock_after: Option<Duration>,
    metrics: MetricsRecorder,
    state: MonitorState,
}

impl FailureMonitor {
    /// Builds an idle monitor. Marker and pattern problems surface here,
    /// before any capture process is started.
    pub fn new(
        config: &PortvaktConfig,
        counters: Arc<FailureCounters>,
        firewall: Arc<dyn BlockingAction>,
        metrics: MetricsRecorder,
    ) -> Result<Self, EngineError> {
        let frames = FrameBuffer::new(&config.detection.boundary_marker)?;
        let matcher = FailureMatcher::from_config(&config.detection)?;

        Ok(Self {
            port: config.monitor.port,
            threshold: config.monitor.failure_threshold,
            frames,
            matcher,
            counters,
            firewall,
            allowlist: config.prevention.firewall.allowlist.clone(),
            reset_on_failure: config.prevention.reset_on_failure,
            unblock_after: config
                .prevention
                .firewall
                .unblock_after_secs
                .map(Duration::from_secs),
            metrics,
            state: MonitorState::Idle,
        })
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn counters(&self) -> Arc<FailureCounters> {
        Arc::clone(&self.counters)
    }

    /// Consumes `source` until it ends or fails. The monitor is stopped
    /// afterwards either way; a read error is returned to the caller.
    #[instrument(skip_all, fields(port = self.port, threshold = self.threshold))]
    pub async fn run<S>(&mut self, source: &mut S) -> Result<RunSummary, EngineError>
    where
        S: LineSource + ?Sized,
    {
        if self.state != MonitorState::Idle {
            return Err(EngineError::InvalidState {
                expected: MonitorState::Idle,
                actual: self.state,
            });
        }
        self.state = MonitorState::Running;
        info!("Monitoring started");

        let mut summary = RunSummary::default();
        let result = loop {
            match source.next_line().await {
                Ok(Some(line)) => {
                    summary.lines += 1;
                    trace!(%line, "Capture line");
                    if let Some(frame) = self.frames.push(&line) {
                        summary.frames += 1;
                        match self.process_frame(&frame).await {
                            FrameOutcome::Ignored => {}
                            FrameOutcome::Counted { .. } | FrameOutcome::Allowlisted { .. } => {
                                summary.failures += 1
                            }
                            FrameOutcome::Blocked { .. } => {
                                summary.failures += 1;
                                summary.blocks += 1;
                            }
                            FrameOutcome::BlockFailed { .. } => {
                                summary.failures += 1;
                                summary.block_failures += 1;
                            }
                        }
                    }
                }
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            }
        };

        summary.dropped_bytes = self.frames.finish();
        self.state = MonitorState::Stopped;
        if summary.dropped_bytes > 0 {
            debug!(
                bytes = summary.dropped_bytes,
                "Discarded unterminated frame at end of stream"
            );
        }

        match result {
            Ok(()) => {
                info!(
                    lines = summary.lines,
                    frames = summary.frames,
                    failures = summary.failures,
                    blocks = summary.blocks,
                    "Capture stream ended"
                );
                Ok(summary)
            }
            Err(e) => {
                error!("Capture stream failed: {e}");
                Err(e.into())
            }
        }
    }

    /// Checks one completed frame and escalates when the threshold is reached.
    pub async fn process_frame(&self, frame: &Frame) -> FrameOutcome {
        self.metrics.frames_inspected.inc();

        let Some(address) = self.matcher.inspect(frame).actionable_address() else {
            return FrameOutcome::Ignored;
        };

        let attempts = self.counters.record_failure(&address);
        self.metrics.failed_attempts.inc();
        info!("Failed attempt from {address} (total: {attempts})");

        if attempts < self.threshold {
            return FrameOutcome::Counted { address, attempts };
        }
        self.escalate(address).await
    }

    async fn escalate(&self, address: String) -> FrameOutcome {
        if self.is_allowlisted(&address) {
            warn!("Allowlisted address {address} reached the failure threshold; not blocking");
            self.counters.reset(&address);
            return FrameOutcome::Allowlisted { address };
        }

        let timer = self.metrics.block_latency.start_timer();
        let result = self.firewall.block(&address).await;
        timer.observe_duration();

        match result {
            Ok(()) => {
                self.metrics.blocks.inc();
                warn!(
                    "Blocked {address} after {} failed attempts",
                    self.threshold
                );
                EventLogger::log_event(
                    "address_blocked",
                    vec![
                        KeyValue::new("address", address.clone()),
                        KeyValue::new("threshold", i64::from(self.threshold)),
                    ],
                )
                .await;
                self.counters.reset(&address);
                self.schedule_unblock(&address);
                FrameOutcome::Blocked { address }
            }
            Err(e) => {
                self.metrics.block_failures.inc();
                error!("Error blocking {address}: {e}");
                EventLogger::log_event(
                    "block_failed",
                    vec![
                        KeyValue::new("address", address.clone()),
                        KeyValue::new("error", e.to_string()),
                    ],
                )
                .await;
                if self.reset_on_failure {
                    self.counters.reset(&address);
                }
                FrameOutcome::BlockFailed {
                    address,
                    reset: self.reset_on_failure,
                }
            }
        }
    }

    fn is_allowlisted(&self, address: &str) -> bool {
        match address.parse::<IpAddr>() {
            Ok(ip) => self.allowlist.iter().any(|network| network.contains(ip)),
            Err(_) => false,
        }
    }

    fn schedule_unblock(&self, address: &str) {
        let Some(delay) = self.unblock_after else {
            return;
        };
        let firewall = Arc::clone(&self.firewall);
        let address = address.to_string();
        debug!("Scheduling unblock of {address} in {}s", delay.as_secs());

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match firewall.unblock(&address).await {
                Ok(()) => {
                    info!("Lifted block on {address}");
                    EventLogger::log_event(
                        "address_unblocked",
                        vec![KeyValue::new("address", address.clone())],
                    )
                    .await;
                }
                Err(e) => error!("Error unblocking {address}: {e}"),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use portvakt_capture::{CaptureError, LineReader};
    use portvakt_prevention::FirewallError;
    use tracing_test::traced_test;

    #[derive(Default)]
    struct RecordingFirewall {
        fail: bool,
        blocked: Mutex<Vec<String>>,
        unblocked: Mutex<Vec<String>>,
    }

    impl RecordingFirewall {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        fn blocked(&self) -> Vec<String> {
            self.blocked.lock().clone()
        }
    }

    #[async_trait]
    impl BlockingAction for RecordingFirewall {
        async fn block(&self, address: &str) -> Result<(), FirewallError> {
            self.blocked.lock().push(address.to_string());
            if self.fail {
                return Err(FirewallError::EmptyCommand);
            }
            Ok(())
        }

        async fn unblock(&self, address: &str) -> Result<(), FirewallError> {
            self.unblocked.lock().push(address.to_string());
            Ok(())
        }
    }

    /// Yields the given lines, then a read error.
    struct BrokenPipe {
        lines: std::vec::IntoIter<String>,
    }

    #[async_trait]
    impl LineSource for BrokenPipe {
        async fn next_line(&mut self) -> Result<Option<String>, CaptureError> {
            match self.lines.next() {
                Some(line) => Ok(Some(line)),
                None => Err(CaptureError::Read(std::io::Error::other("pipe closed"))),
            }
        }
    }

    fn failure_frame(source: &str) -> Frame {
        Frame::from(
            format!(
                "12:00:01.000000 IP 192.168.1.10.81 > {source}.51514: Flags [P.], length 139\n\
                 E.....@.@.......HTTP/1.1 401 Unauthorized\n"
            )
            .as_str(),
        )
    }

    fn success_frame(source: &str) -> Frame {
        Frame::from(
            format!(
                "12:00:01.000000 IP 192.168.1.10.81 > {source}.51514: Flags [P.], length 119\n\
                 E.....@.@.......HTTP/1.1 200 OK\n"
            )
            .as_str(),
        )
    }

    fn monitor_with(
        config: PortvaktConfig,
        firewall: Arc<RecordingFirewall>,
    ) -> FailureMonitor {
        FailureMonitor::new(
            &config,
            Arc::new(FailureCounters::new()),
            firewall,
            MetricsRecorder::new().unwrap(),
        )
        .unwrap()
    }

    fn monitor(firewall: Arc<RecordingFirewall>) -> FailureMonitor {
        monitor_with(PortvaktConfig::default(), firewall)
    }

    #[tokio::test]
    async fn blocks_on_third_failure_and_starts_over() {
        let firewall = Arc::new(RecordingFirewall::default());
        let monitor = monitor(firewall.clone());
        let counters = monitor.counters();
        let frame = failure_frame("10.0.0.5");

        for expected in 1..=2 {
            assert_eq!(
                monitor.process_frame(&frame).await,
                FrameOutcome::Counted {
                    address: "10.0.0.5".into(),
                    attempts: expected
                }
            );
        }
        assert!(firewall.blocked().is_empty());
        assert_eq!(counters.attempts("10.0.0.5"), Some(2));

        assert_eq!(
            monitor.process_frame(&frame).await,
            FrameOutcome::Blocked {
                address: "10.0.0.5".into()
            }
        );
        assert_eq!(firewall.blocked(), vec!["10.0.0.5"]);
        assert_eq!(counters.attempts("10.0.0.5"), Some(0));

        assert_eq!(
            monitor.process_frame(&frame).await,
            FrameOutcome::Counted {
                address: "10.0.0.5".into(),
                attempts: 1
            }
        );
        assert_eq!(firewall.blocked().len(), 1);
    }

    #[tokio::test]
    async fn frames_without_failure_are_a_no_op() {
        let firewall = Arc::new(RecordingFirewall::default());
        let monitor = monitor(firewall.clone());

        for _ in 0..10 {
            assert_eq!(
                monitor.process_frame(&success_frame("10.0.0.5")).await,
                FrameOutcome::Ignored
            );
        }
        assert!(monitor.counters().is_empty());
        assert!(firewall.blocked().is_empty());
    }

    #[tokio::test]
    async fn malformed_address_line_is_ignored() {
        let firewall = Arc::new(RecordingFirewall::default());
        let monitor = monitor(firewall.clone());
        let frame = Frame::from("IP 192.168.1.10.81 > garbage\nHTTP/1.1 401 Unauthorized\n");

        assert_eq!(monitor.process_frame(&frame).await, FrameOutcome::Ignored);
        assert!(monitor.counters().is_empty());
    }

    #[traced_test]
    #[tokio::test]
    async fn failed_block_is_logged_and_still_resets() {
        let firewall = Arc::new(RecordingFirewall::failing());
        let monitor = monitor(firewall.clone());
        let frame = failure_frame("10.0.0.5");

        monitor.process_frame(&frame).await;
        monitor.process_frame(&frame).await;
        assert_eq!(
            monitor.process_frame(&frame).await,
            FrameOutcome::BlockFailed {
                address: "10.0.0.5".into(),
                reset: true
            }
        );
        assert!(logs_contain("Error blocking 10.0.0.5"));
        assert_eq!(monitor.counters().attempts("10.0.0.5"), Some(0));
    }

    #[tokio::test]
    async fn failed_block_keeps_count_when_reset_is_disabled() {
        let mut config = PortvaktConfig::default();
        config.prevention.reset_on_failure = false;
        let firewall = Arc::new(RecordingFirewall::failing());
        let monitor = monitor_with(config, firewall.clone());
        let frame = failure_frame("10.0.0.5");

        for _ in 0..3 {
            monitor.process_frame(&frame).await;
        }
        assert_eq!(monitor.counters().attempts("10.0.0.5"), Some(3));

        // Every further failure retries the block.
        monitor.process_frame(&frame).await;
        assert_eq!(firewall.blocked().len(), 2);
    }

    #[tokio::test]
    async fn allowlisted_address_is_never_blocked() {
        let mut config = PortvaktConfig::default();
        config
            .prevention
            .firewall
            .allowlist
            .push("10.0.0.0/24".parse().unwrap());
        let firewall = Arc::new(RecordingFirewall::default());
        let monitor = monitor_with(config, firewall.clone());
        let frame = failure_frame("10.0.0.5");

        monitor.process_frame(&frame).await;
        monitor.process_frame(&frame).await;
        assert_eq!(
            monitor.process_frame(&frame).await,
            FrameOutcome::Allowlisted {
                address: "10.0.0.5".into()
            }
        );
        assert!(firewall.blocked().is_empty());
        assert_eq!(monitor.counters().attempts("10.0.0.5"), Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn block_is_lifted_after_configured_delay() {
        let mut config = PortvaktConfig::default();
        config.monitor.failure_threshold = 1;
        config.prevention.firewall.unblock_after_secs = Some(60);
        let firewall = Arc::new(RecordingFirewall::default());
        let monitor = monitor_with(config, firewall.clone());

        monitor.process_frame(&failure_frame("10.0.0.5")).await;
        assert!(firewall.unblocked.lock().is_empty());

        tokio::time::sleep(Duration::from_secs(61)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(*firewall.unblocked.lock(), vec!["10.0.0.5".to_string()]);
    }

    #[tokio::test]
    async fn run_processes_stream_and_stops() {
        let firewall = Arc::new(RecordingFirewall::default());
        let mut monitor = monitor(firewall.clone());

        let mut capture = String::new();
        for source in ["10.0.0.5", "10.0.0.7", "10.0.0.5", "10.0.0.5"] {
            capture.push_str(failure_frame(source).as_str());
        }
        capture.push_str(success_frame("10.0.0.9").as_str());
        capture.push_str("IP 192.168.1.10.81 > 10.0.0.5.51514: trailing partial\n");

        let mut source = LineReader::new(capture.as_bytes());
        assert_eq!(monitor.state(), MonitorState::Idle);
        let summary = monitor.run(&mut source).await.unwrap();

        assert_eq!(monitor.state(), MonitorState::Stopped);
        assert_eq!(summary.lines, 11);
        assert_eq!(summary.frames, 5);
        assert_eq!(summary.failures, 4);
        assert_eq!(summary.blocks, 1);
        assert!(summary.dropped_bytes > 0);
        assert_eq!(firewall.blocked(), vec!["10.0.0.5"]);
        assert_eq!(monitor.counters().attempts("10.0.0.7"), Some(1));
    }

    #[traced_test]
    #[tokio::test]
    async fn block_failure_does_not_stop_the_loop() {
        let firewall = Arc::new(RecordingFirewall::failing());
        let mut config = PortvaktConfig::default();
        config.monitor.failure_threshold = 1;
        let mut monitor = monitor_with(config, firewall.clone());

        let mut capture = String::new();
        for source in ["10.0.0.5", "10.0.0.6", "10.0.0.7"] {
            capture.push_str(failure_frame(source).as_str());
        }
        let summary = monitor
            .run(&mut LineReader::new(capture.as_bytes()))
            .await
            .unwrap();

        assert_eq!(summary.block_failures, 3);
        assert_eq!(firewall.blocked().len(), 3);
        assert!(logs_contain("Error blocking 10.0.0.7"));
    }

    #[tokio::test]
    async fn read_error_stops_monitor_and_propagates() {
        let mut monitor = monitor(Arc::new(RecordingFirewall::default()));
        let lines: Vec<String> = failure_frame("10.0.0.5")
            .lines()
            .map(String::from)
            .collect();
        let mut source = BrokenPipe {
            lines: lines.into_iter(),
        };

        let err = monitor.run(&mut source).await.unwrap_err();
        assert!(matches!(err, EngineError::Capture(CaptureError::Read(_))));
        assert_eq!(monitor.state(), MonitorState::Stopped);
        assert_eq!(monitor.counters().attempts("10.0.0.5"), Some(1));
    }

    #[tokio::test]
    async fn stopped_monitor_cannot_be_restarted() {
        let mut monitor = monitor(Arc::new(RecordingFirewall::default()));
        monitor
            .run(&mut LineReader::new(&b""[..]))
            .await
            .unwrap();

        let err = monitor
            .run(&mut LineReader::new(&b""[..]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidState {
                actual: MonitorState::Stopped,
                ..
            }
        ));
    }

    #[test]
    fn empty_marker_fails_fast() {
        let mut config = PortvaktConfig::default();
        config.detection.boundary_marker.clear();
        let result = FailureMonitor::new(
            &config,
            Arc::new(FailureCounters::new()),
            Arc::new(RecordingFirewall::default()),
            MetricsRecorder::new().unwrap(),
        );
        assert!(matches!(result, Err(EngineError::Detection(_))));
    }
}
