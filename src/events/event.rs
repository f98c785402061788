//! # Lifecycle events emitted by the dispatcher.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Intake events**: registration and debouncing of invocations
//! - **Initialization events**: start routine requested, failed, dead or stale
//! - **Active events**: operation activated, replaced, delivered, failed, discarded
//! - **Runtime events**: subscriber overflow/panic and engine shutdown
//!
//! The [`Event`] struct carries metadata such as the source id, key, invocation
//! sequence, debounce delay and a reason.
//!
//! ## Ordering guarantees
//! Each event carries a per-engine sequence number (`seq`) stamped by the
//! [`Bus`](super::Bus) at publish time. Use it to restore order across receivers.
//!
//! ## Example
//! ```rust
//! use supersede::{Event, EventKind, Key, Sequence};
//!
//! let ev = Event::new(EventKind::StartFailed)
//!     .with_key(Key::from("card-7"))
//!     .with_sequence(Sequence::new(120))
//!     .with_reason("http 503");
//!
//! assert_eq!(ev.kind, EventKind::StartFailed);
//! assert_eq!(ev.key.as_ref().map(|k| k.as_str()), Some("card-7"));
//! assert_eq!(ev.reason.as_deref(), Some("http 503"));
//! ```

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::core::{Key, Sequence};

/// Classification of lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Intake ===
    /// Invocation received a sequence and entered the pipeline.
    ///
    /// Sets: `key`, `sequence`
    InvocationRegistered,

    /// Invocation parked in the debounce table.
    ///
    /// Sets: `key`, `sequence`, `delay_ms`
    DebounceScheduled,

    /// Quiet period elapsed and the invocation was admitted.
    ///
    /// Sets: `key`, `sequence`
    DebounceElapsed,

    /// Invocation was dropped before starting (superseded).
    ///
    /// Sets: `key`, `sequence`, `reason`
    InvocationDropped,

    // === Initialization ===
    /// Start routine invoked.
    ///
    /// Sets: `key`, `sequence`
    StartRequested,

    /// Start routine failed.
    ///
    /// Sets: `key`, `sequence`, `reason`
    StartFailed,

    /// Start resolved after a newer invocation re-entered initialization;
    /// the started operation was cancelled.
    ///
    /// Sets: `key`, `sequence`
    StartDead,

    /// Start resolved after a newer invocation became active;
    /// the started operation was cancelled.
    ///
    /// Sets: `key`, `sequence`
    StartStale,

    // === Active ===
    /// Operation started and is awaiting its result.
    ///
    /// Sets: `key`, `sequence`
    OperationActivated,

    /// Active operation cancelled because a newer one replaced it.
    ///
    /// Sets: `key`, `sequence` (of the replaced invocation)
    OperationReplaced,

    /// Result accepted and delivered to subscribers.
    ///
    /// Sets: `key`, `sequence`
    ResultDelivered,

    /// Result future failed for the current invocation.
    ///
    /// Sets: `key`, `sequence`, `reason`
    OperationFailed,

    /// Settlement arrived for an invocation that no longer owns its key.
    ///
    /// Sets: `key`, `sequence`
    ResultDiscarded,

    // === Runtime ===
    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `reason`
    SubscriberOverflow,

    /// Subscriber panicked during event processing.
    ///
    /// Sets: `reason`
    SubscriberPanicked,

    /// Engine shut down; all in-flight work was cancelled.
    EngineStopped,
}

impl EventKind {
    /// Returns a short stable label (kebab-case) for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            EventKind::InvocationRegistered => "registered",
            EventKind::DebounceScheduled => "debounce-scheduled",
            EventKind::DebounceElapsed => "debounce-elapsed",
            EventKind::InvocationDropped => "dropped",
            EventKind::StartRequested => "start-requested",
            EventKind::StartFailed => "start-failed",
            EventKind::StartDead => "start-dead",
            EventKind::StartStale => "start-stale",
            EventKind::OperationActivated => "activated",
            EventKind::OperationReplaced => "replaced",
            EventKind::ResultDelivered => "delivered",
            EventKind::OperationFailed => "failed",
            EventKind::ResultDiscarded => "discarded",
            EventKind::SubscriberOverflow => "subscriber-overflow",
            EventKind::SubscriberPanicked => "subscriber-panicked",
            EventKind::EngineStopped => "engine-stopped",
        }
    }
}

/// Lifecycle event with optional metadata.
///
/// - `seq`: per-engine sequence, stamped on publish
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Monotonically increasing publish order within one engine.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Diagnostic id of the engine that published the event.
    pub source: Option<Arc<str>>,
    /// Key of the invocation, if applicable.
    pub key: Option<Key>,
    /// Sequence of the invocation, if applicable.
    pub sequence: Option<Sequence>,
    /// Debounce delay in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Human-readable reason (errors, drop cause, overflow details).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with the current timestamp.
    ///
    /// `seq` is assigned by [`Bus::publish`](super::Bus::publish).
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: 0,
            at: SystemTime::now(),
            kind,
            source: None,
            key: None,
            sequence: None,
            delay_ms: None,
            reason: None,
        }
    }

    /// Attaches the engine's diagnostic id.
    #[inline]
    pub fn with_source(mut self, source: impl Into<Arc<str>>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Attaches a key.
    #[inline]
    pub fn with_key(mut self, key: Key) -> Self {
        self.key = Some(key);
        self
    }

    /// Attaches an invocation sequence.
    #[inline]
    pub fn with_sequence(mut self, sequence: Sequence) -> Self {
        self.sequence = Some(sequence);
        self
    }

    /// Attaches a debounce delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_reason(format!("subscriber={subscriber} info={info}"))
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }
}
