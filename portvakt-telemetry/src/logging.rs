//! ## portvakt-telemetry::logging
//! **Structured logging with tracing**
//!
//! Security-relevant events (failed attempts, blocks, block failures) go
//! through [`EventLogger::log_event`] so they share one span name and can be
//! filtered as a group.

use opentelemetry::KeyValue;
use tracing::{info_span, Instrument};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Clone)]
pub struct EventLogger;

impl EventLogger {
    /// Installs the global subscriber. `RUST_LOG` wins over `default_level`.
    ///
    /// Returns `false` when a subscriber was already installed; the existing
    /// one is kept.
    pub fn init(default_level: &str) -> bool {
        fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new(default_level)),
            )
            .with_thread_names(true)
            .with_span_events(FmtSpan::NONE)
            .try_init()
            .is_ok()
    }

    #[inline]
    pub async fn log_event(event_type: &str, metadata: Vec<KeyValue>) {
        let span = info_span!(
            "security_event",
            event_type = event_type,
            otel.kind = "INTERNAL"
        );

        async {
            tracing::info!(
                metadata = ?metadata,
                "Security event occurred"
            );
        }
        .instrument(span)
        .await
    }
}
