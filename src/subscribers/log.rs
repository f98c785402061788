//! # LogWriter: structured event logger
//!
//! A subscriber that writes every [`Event`] as a `tracing` record under the
//! `supersede` target. Install any `tracing` subscriber to see the output.
//!
//! ## Example output (with `tracing_subscriber::fmt`)
//! ```text
//! DEBUG supersede: registered source="cart" key=card-7 sequence=120
//! DEBUG supersede: debounce-scheduled source="cart" key=card-7 sequence=150 delay_ms=200
//! DEBUG supersede: replaced source="cart" key=card-7 sequence=120
//!  INFO supersede: delivered source="cart" key=card-7 sequence=150
//!  WARN supersede: failed source="cart" key=card-9 sequence=300 reason="operation failed: 503"
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let label = e.kind.as_label();
        let source = e.source.as_deref().unwrap_or("-");
        let key = e.key.as_ref().map(|k| k.as_str()).unwrap_or("-");
        let sequence = e.sequence.map(|s| s.get());

        match e.kind {
            EventKind::StartFailed
            | EventKind::OperationFailed
            | EventKind::SubscriberOverflow
            | EventKind::SubscriberPanicked => {
                tracing::warn!(target: "supersede", source, key, ?sequence, reason = ?e.reason, "{label}");
            }
            EventKind::ResultDelivered | EventKind::EngineStopped => {
                tracing::info!(target: "supersede", source, key, ?sequence, "{label}");
            }
            EventKind::DebounceScheduled => {
                tracing::debug!(target: "supersede", source, key, ?sequence, delay_ms = ?e.delay_ms, "{label}");
            }
            _ => {
                tracing::debug!(target: "supersede", source, key, ?sequence, reason = ?e.reason, "{label}");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
