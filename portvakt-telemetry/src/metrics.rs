//! ## portvakt-telemetry::metrics
//! **Prometheus counters for the failure monitor**

use prometheus::{Histogram, HistogramOpts, IntCounter, Registry};

#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    pub registry: Registry,
    pub frames_inspected: IntCounter,
    pub failed_attempts: IntCounter,
    pub blocks: IntCounter,
    pub block_failures: IntCounter,
    pub block_latency: Histogram,
}

impl MetricsRecorder {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let frames_inspected =
            IntCounter::new("portvakt_frames_total", "Completed frames checked for failures")?;
        let failed_attempts = IntCounter::new(
            "portvakt_failed_attempts_total",
            "Authentication failures attributed to a source address",
        )?;
        let blocks = IntCounter::new("portvakt_blocks_total", "Successful block actions")?;
        let block_failures =
            IntCounter::new("portvakt_block_failures_total", "Block actions that failed")?;
        let block_latency = Histogram::with_opts(
            HistogramOpts::new(
                "portvakt_block_latency_seconds",
                "Time spent in the block action",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        )?;

        registry.register(Box::new(frames_inspected.clone()))?;
        registry.register(Box::new(failed_attempts.clone()))?;
        registry.register(Box::new(blocks.clone()))?;
        registry.register(Box::new(block_failures.clone()))?;
        registry.register(Box::new(block_latency.clone()))?;

        Ok(Self {
            registry,
            frames_inspected,
            failed_attempts,
            blocks,
            block_failures,
            block_latency,
        })
    }

    pub fn gather_metrics(&self) -> Result<String, prometheus::Error> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::<u8>::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_registered_counters() {
        let metrics = MetricsRecorder::new().unwrap();
        metrics.failed_attempts.inc();
        metrics.blocks.inc();

        let text = metrics.gather_metrics().unwrap();
        assert!(text.contains("portvakt_failed_attempts_total 1"));
        assert!(text.contains("portvakt_blocks_total 1"));
        assert!(text.contains("portvakt_block_latency_seconds"));
    }

    #[test]
    fn recorders_are_independent() {
        let first = MetricsRecorder::new().unwrap();
        let second = MetricsRecorder::new().unwrap();
        first.frames_inspected.inc();
        assert_eq!(second.frames_inspected.get(), 0);
    }
}
