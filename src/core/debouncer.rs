//! # Debouncer: public handle of one engine instance.
//!
//! Owns the dispatcher and subscriber-listener tasks and exposes the caller
//! surface: `run`, the result/failure streams and the loading observables.
//!
//! ## Lifecycle
//! ```text
//! Debouncer::builder(op).build()
//!     ├─► spawn Dispatcher::run(rx)            (owns the keyed tables)
//!     └─► spawn subscriber_listener            (Bus → SubscriberSet)
//!
//! run(inv) ─► Sequencer::next ─► Command::Run ─► dispatcher
//!
//! shutdown()
//!     ├─► runtime.cancel() ─► dispatcher tears down (timers + in-flight cancelled)
//!     ├─► join dispatcher
//!     └─► stop listener after draining, flush subscribers
//! ```
//!
//! Dropping the `Debouncer` cancels the runtime as well; outstanding
//! [`RunHandle`]s then report [`RunError::Closed`].

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::builder::DebouncerBuilder;
use crate::core::dispatcher::Command;
use crate::core::invocation::{Delivery, Failure, Invocation, Key, Registered, Sequence};
use crate::core::sequencer::Sequencer;
use crate::error::RunError;
use crate::events::{Bus, Event};
use crate::operation::OperationRef;

/// Cloneable, submit-only handle to an engine.
pub struct RunHandle<P, D> {
    tx: mpsc::UnboundedSender<Command<P, D>>,
    sequencer: Arc<Sequencer>,
    runtime: CancellationToken,
}

impl<P, D> Clone for RunHandle<P, D> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            sequencer: Arc::clone(&self.sequencer),
            runtime: self.runtime.clone(),
        }
    }
}

impl<P, D> RunHandle<P, D> {
    pub(crate) fn new(
        tx: mpsc::UnboundedSender<Command<P, D>>,
        sequencer: Arc<Sequencer>,
        runtime: CancellationToken,
    ) -> Self {
        Self {
            tx,
            sequencer,
            runtime,
        }
    }

    /// Submits an invocation (fire-and-forget) and returns its sequence.
    ///
    /// The result, if this invocation ends up owning its key, arrives on
    /// [`Debouncer::results`].
    pub fn run(&self, invocation: Invocation<P>) -> Result<Sequence, RunError> {
        if self.runtime.is_cancelled() {
            return Err(RunError::Closed);
        }
        let sequence = self.sequencer.next(invocation.time);
        let reg = Registered {
            key: invocation.key.unwrap_or_default(),
            sequence,
            payload: invocation.payload,
        };
        self.tx
            .send(Command::Run(reg))
            .map_err(|_| RunError::Closed)?;
        Ok(sequence)
    }

    /// Current engine-clock time in milliseconds (the default sequence value).
    pub fn now(&self) -> u64 {
        self.sequencer.now()
    }
}

/// One engine instance: per-key debounced, cancellable, latest-wins operation.
///
/// # Example
/// ```rust
/// use std::time::Duration;
/// use supersede::{Config, Debouncer, Invocation, OperationError, OperationFn, OperationRef, Started};
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let op: OperationRef<u32, u32> = OperationFn::arc(|qty: u32| async move {
///         Ok::<_, OperationError>(Started::new(async move {
///             tokio::time::sleep(Duration::from_millis(5)).await;
///             Ok(qty)
///         }))
///     });
///
///     let engine = Debouncer::builder(op)
///         .source("cart")
///         .config(Config::with_debounce_ms(200))
///         .build();
///     let mut results = engine.results();
///
///     engine.run(Invocation::new(1).with_key("card-7"))?;
///     let delivered = results.recv().await?;
///     assert_eq!(*delivered.data, 1);
///
///     engine.shutdown().await;
///     Ok(())
/// }
/// ```
pub struct Debouncer<P, D> {
    source: Arc<str>,
    handle: RunHandle<P, D>,
    bus: Bus,
    results: broadcast::Sender<Delivery<D>>,
    failures: broadcast::Sender<Failure>,
    loading_keys: watch::Receiver<BTreeSet<Key>>,
    is_loading: watch::Receiver<bool>,
    runtime: CancellationToken,
    listener_stop: CancellationToken,
    dispatcher: Option<JoinHandle<()>>,
    listener: Option<JoinHandle<()>>,
}

pub(crate) struct DebouncerParts<P, D> {
    pub source: Arc<str>,
    pub handle: RunHandle<P, D>,
    pub bus: Bus,
    pub results: broadcast::Sender<Delivery<D>>,
    pub failures: broadcast::Sender<Failure>,
    pub loading_keys: watch::Receiver<BTreeSet<Key>>,
    pub is_loading: watch::Receiver<bool>,
    pub runtime: CancellationToken,
    pub listener_stop: CancellationToken,
    pub dispatcher: JoinHandle<()>,
    pub listener: JoinHandle<()>,
}

impl<P, D> Debouncer<P, D>
where
    P: Send + 'static,
    D: Send + Sync + 'static,
{
    /// Starts building an engine around `operation`.
    pub fn builder(operation: OperationRef<P, D>) -> DebouncerBuilder<P, D> {
        DebouncerBuilder::new(operation)
    }

    pub(crate) fn from_parts(parts: DebouncerParts<P, D>) -> Self {
        Self {
            source: parts.source,
            handle: parts.handle,
            bus: parts.bus,
            results: parts.results,
            failures: parts.failures,
            loading_keys: parts.loading_keys,
            is_loading: parts.is_loading,
            runtime: parts.runtime,
            listener_stop: parts.listener_stop,
            dispatcher: Some(parts.dispatcher),
            listener: Some(parts.listener),
        }
    }

    /// Submits an invocation. See [`RunHandle::run`].
    pub fn run(&self, invocation: Invocation<P>) -> Result<Sequence, RunError> {
        self.handle.run(invocation)
    }

    /// Returns a cloneable submit-only handle.
    pub fn handle(&self) -> RunHandle<P, D> {
        self.handle.clone()
    }

    /// Current engine-clock time in milliseconds.
    pub fn now(&self) -> u64 {
        self.handle.now()
    }

    /// Diagnostic id of this engine.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Stream of accepted results, at most one per invocation.
    ///
    /// Receivers only observe results delivered after they subscribe.
    pub fn results(&self) -> broadcast::Receiver<Delivery<D>> {
        self.results.subscribe()
    }

    /// Stream of start/settlement failures of invocations owning their key.
    pub fn failures(&self) -> broadcast::Receiver<Failure> {
        self.failures.subscribe()
    }

    /// Observable set of keys in the Debounce, Initializing or Active stage.
    pub fn loading_keys(&self) -> watch::Receiver<BTreeSet<Key>> {
        self.loading_keys.clone()
    }

    /// Observable flag: true iff [`loading_keys`](Self::loading_keys) is non-empty.
    pub fn is_loading(&self) -> watch::Receiver<bool> {
        self.is_loading.clone()
    }

    /// Stream of diagnostic lifecycle events.
    pub fn events(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Cancels all pending and in-flight work, then waits for the engine to stop.
    pub async fn shutdown(mut self) {
        self.runtime.cancel();
        if let Some(dispatcher) = self.dispatcher.take() {
            if dispatcher.await.is_err() {
                tracing::warn!(source = %self.source, "dispatcher task panicked");
            }
        }
        self.listener_stop.cancel();
        if let Some(listener) = self.listener.take() {
            let _ = listener.await;
        }
    }
}

impl<P, D> Drop for Debouncer<P, D> {
    fn drop(&mut self) {
        self.runtime.cancel();
        self.listener_stop.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use tokio::sync::broadcast::error::TryRecvError;
    use tokio::time::{sleep, Instant};

    use super::*;
    use crate::config::Config;
    use crate::core::invocation::FailureStage;
    use crate::error::OperationError;
    use crate::events::EventKind;
    use crate::operation::{OperationFn, Started};

    /// Records when each payload started and which ones were cancelled.
    struct Probe {
        origin: Instant,
        starts: Mutex<Vec<(u32, u64)>>,
        cancels: Mutex<Vec<u32>>,
    }

    impl Probe {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                origin: Instant::now(),
                starts: Mutex::new(Vec::new()),
                cancels: Mutex::new(Vec::new()),
            })
        }

        fn starts(&self) -> Vec<(u32, u64)> {
            self.starts.lock().unwrap().clone()
        }

        fn cancels(&self) -> Vec<u32> {
            self.cancels.lock().unwrap().clone()
        }
    }

    async fn pause(ms: u64) {
        if ms > 0 {
            sleep(Duration::from_millis(ms)).await;
        }
    }

    /// Payload `0` fails to start, payload `13` fails to settle, anything else
    /// resolves to `payload * 10`.
    fn probed_op(
        probe: &Arc<Probe>,
        start_ms: fn(u32) -> u64,
        settle_ms: fn(u32) -> u64,
    ) -> OperationRef<u32, u32> {
        let probe = Arc::clone(probe);
        OperationFn::arc(move |p: u32| {
            let probe = Arc::clone(&probe);
            async move {
                let at = probe.origin.elapsed().as_millis() as u64;
                probe.starts.lock().unwrap().push((p, at));
                pause(start_ms(p)).await;
                if p == 0 {
                    return Err(OperationError::fail("rejected"));
                }
                let cancels = Arc::clone(&probe);
                Ok(Started::new(async move {
                    pause(settle_ms(p)).await;
                    if p == 13 {
                        Err(OperationError::fail("bad payload"))
                    } else {
                        Ok(p * 10)
                    }
                })
                .with_cancel(move || cancels.cancels.lock().unwrap().push(p)))
            }
        })
    }

    fn engine(op: OperationRef<u32, u32>, debounce_ms: u64) -> Debouncer<u32, u32> {
        Debouncer::builder(op)
            .source("test")
            .config(Config::with_debounce_ms(debounce_ms))
            .build()
    }

    fn drain_events(rx: &mut broadcast::Receiver<Event>) -> Vec<(EventKind, Option<Sequence>)> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push((ev.kind, ev.sequence));
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn single_invocation_starts_once_and_delivers() {
        let probe = Probe::new();
        let engine = engine(probed_op(&probe, |_| 0, |_| 500), 200);
        let mut results = engine.results();

        let seq = engine.run(Invocation::new(4)).unwrap();
        let delivered = results.recv().await.unwrap();

        assert_eq!(delivered.key, Key::default());
        assert_eq!(delivered.sequence, seq);
        assert_eq!(*delivered.data, 40);
        assert_eq!(probe.starts(), vec![(4, 0)]);
        assert!(probe.cancels().is_empty());
        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_invocations_keep_first_and_latest() {
        let probe = Probe::new();
        let engine = engine(probed_op(&probe, |_| 0, |_| 500), 200);
        let mut results = engine.results();
        let mut events = engine.events();

        engine.run(Invocation::new(1)).unwrap();
        pause(50).await;
        let coalesced = engine.run(Invocation::new(2)).unwrap();
        pause(50).await;
        let latest = engine.run(Invocation::new(3)).unwrap();

        let delivered = results.recv().await.unwrap();
        assert_eq!(delivered.sequence, latest);
        assert_eq!(*delivered.data, 30);
        assert_eq!(probe.starts(), vec![(1, 0), (3, 300)]);
        assert_eq!(probe.cancels(), vec![1]);

        let seen = drain_events(&mut events);
        assert!(seen.contains(&(EventKind::InvocationDropped, Some(coalesced))));
        assert!(seen.contains(&(EventKind::OperationActivated, Some(latest))));

        pause(1_000).await;
        assert!(matches!(results.try_recv(), Err(TryRecvError::Empty)));
        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn quiet_period_holds_after_fast_operation_settles() {
        let probe = Probe::new();
        let engine = engine(probed_op(&probe, |_| 0, |_| 10), 200);
        let mut results = engine.results();

        engine.run(Invocation::new(1)).unwrap();
        pause(50).await;
        engine.run(Invocation::new(2)).unwrap();
        pause(50).await;
        engine.run(Invocation::new(3)).unwrap();

        assert_eq!(*results.recv().await.unwrap().data, 10);
        assert_eq!(*results.recv().await.unwrap().data, 30);
        assert_eq!(probe.starts(), vec![(1, 0), (3, 300)]);

        // Window of the last dispatch (t=300) is long over: immediate again.
        pause(1_000).await;
        engine.run(Invocation::new(4)).unwrap();
        assert_eq!(*results.recv().await.unwrap().data, 40);
        assert_eq!(probe.starts(), vec![(1, 0), (3, 300), (4, 1_310)]);
        assert!(probe.cancels().is_empty());
        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn keys_run_independently() {
        let probe = Probe::new();
        let engine = engine(probed_op(&probe, |_| 0, |_| 100), 200);
        let mut results = engine.results();

        engine.run(Invocation::new(1).with_key("a")).unwrap();
        engine.run(Invocation::new(2).with_key("b")).unwrap();

        let mut delivered = vec![results.recv().await.unwrap(), results.recv().await.unwrap()];
        delivered.sort_by(|x, y| x.key.cmp(&y.key));
        assert_eq!(delivered[0].key, Key::from("a"));
        assert_eq!(*delivered[0].data, 10);
        assert_eq!(delivered[1].key, Key::from("b"));
        assert_eq!(*delivered[1].data, 20);
        assert_eq!(probe.starts(), vec![(1, 0), (2, 0)]);
        assert!(probe.cancels().is_empty());
        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn newer_active_cancels_older_once() {
        let probe = Probe::new();
        // Older result would arrive last.
        let engine = engine(
            probed_op(&probe, |_| 0, |p| if p == 1 { 300 } else { 100 }),
            0,
        );
        let mut results = engine.results();

        engine.run(Invocation::new(1)).unwrap();
        pause(10).await;
        let newer = engine.run(Invocation::new(2)).unwrap();

        let delivered = results.recv().await.unwrap();
        assert_eq!(delivered.sequence, newer);
        assert_eq!(*delivered.data, 20);

        pause(1_000).await;
        assert!(matches!(results.try_recv(), Err(TryRecvError::Empty)));
        assert_eq!(probe.cancels(), vec![1]);
        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn slow_start_resolving_after_newer_is_dead() {
        let probe = Probe::new();
        let engine = engine(
            probed_op(&probe, |p| if p == 1 { 100 } else { 200 }, |_| 0),
            0,
        );
        let mut results = engine.results();
        let mut events = engine.events();

        let first = engine.run(Invocation::new(1)).unwrap();
        pause(10).await;
        let second = engine.run(Invocation::new(2)).unwrap();

        let delivered = results.recv().await.unwrap();
        assert_eq!(delivered.sequence, second);
        assert_eq!(*delivered.data, 20);
        assert_eq!(probe.cancels(), vec![1]);
        assert!(drain_events(&mut events).contains(&(EventKind::StartDead, Some(first))));
        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn slow_start_resolving_after_newer_settled_is_not_delivered() {
        let probe = Probe::new();
        let engine = engine(
            probed_op(&probe, |p| if p == 1 { 300 } else { 50 }, |_| 0),
            0,
        );
        let mut results = engine.results();

        engine.run(Invocation::new(1)).unwrap();
        pause(10).await;
        engine.run(Invocation::new(2)).unwrap();

        assert_eq!(*results.recv().await.unwrap().data, 20);
        pause(1_000).await;
        assert!(matches!(results.try_recv(), Err(TryRecvError::Empty)));
        assert_eq!(probe.cancels(), vec![1]);
        assert!(!*engine.is_loading().borrow());
        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn settled_operation_is_not_cancelled_later() {
        let probe = Probe::new();
        let engine = engine(probed_op(&probe, |_| 0, |_| 100), 200);
        let mut results = engine.results();

        engine.run(Invocation::new(1)).unwrap();
        assert_eq!(*results.recv().await.unwrap().data, 10);

        pause(1_000).await;
        engine.run(Invocation::new(2)).unwrap();
        assert_eq!(*results.recv().await.unwrap().data, 20);

        pause(1_000).await;
        assert!(matches!(results.try_recv(), Err(TryRecvError::Empty)));
        assert!(probe.cancels().is_empty());
        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn loading_follows_the_pipeline() {
        let probe = Probe::new();
        let engine = engine(probed_op(&probe, |_| 0, |_| 100), 200);
        let mut results = engine.results();
        let mut loading = engine.is_loading();
        let keys = engine.loading_keys();
        assert!(!*loading.borrow());

        engine.run(Invocation::new(1).with_key("card")).unwrap();
        loading.wait_for(|busy| *busy).await.unwrap();
        assert!(keys.borrow().contains(&Key::from("card")));

        results.recv().await.unwrap();
        loading.wait_for(|busy| !*busy).await.unwrap();
        assert!(keys.borrow().is_empty());
        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn debounced_key_counts_as_loading() {
        let probe = Probe::new();
        let engine = engine(probed_op(&probe, |_| 0, |_| 100), 200);
        let mut results = engine.results();
        let keys = engine.loading_keys();

        engine.run(Invocation::new(1)).unwrap();
        pause(50).await;
        engine.run(Invocation::new(2)).unwrap();
        assert_eq!(*results.recv().await.unwrap().data, 10);

        // Only the debounced invocation remains for the key.
        pause(50).await;
        assert!(keys.borrow().contains(&Key::default()));
        assert_eq!(probe.starts(), vec![(1, 0)]);

        assert_eq!(*results.recv().await.unwrap().data, 20);
        assert_eq!(probe.starts(), vec![(1, 0), (2, 250)]);
        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn start_failure_is_surfaced_once_and_key_recovers() {
        let probe = Probe::new();
        let engine = engine(probed_op(&probe, |_| 10, |_| 10), 200);
        let mut results = engine.results();
        let mut failures = engine.failures();
        let mut loading = engine.is_loading();

        let failed = engine.run(Invocation::new(0)).unwrap();
        let failure = failures.recv().await.unwrap();
        assert_eq!(failure.sequence, failed);
        assert_eq!(failure.stage, FailureStage::Start);
        assert_eq!(*failure.error, OperationError::fail("rejected"));
        loading.wait_for(|busy| !*busy).await.unwrap();

        pause(500).await;
        engine.run(Invocation::new(5)).unwrap();
        assert_eq!(*results.recv().await.unwrap().data, 50);
        assert!(matches!(failures.try_recv(), Err(TryRecvError::Empty)));
        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn settle_failure_is_surfaced() {
        let probe = Probe::new();
        let engine = engine(probed_op(&probe, |_| 0, |_| 100), 0);
        let mut results = engine.results();
        let mut failures = engine.failures();

        let seq = engine.run(Invocation::new(13)).unwrap();
        let failure = failures.recv().await.unwrap();
        assert_eq!(failure.sequence, seq);
        assert_eq!(failure.stage, FailureStage::Settle);
        assert!(matches!(results.try_recv(), Err(TryRecvError::Empty)));
        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_failure_is_not_surfaced() {
        let probe = Probe::new();
        let engine = engine(probed_op(&probe, |_| 0, |p| if p == 13 { 50 } else { 100 }), 0);
        let mut results = engine.results();
        let mut failures = engine.failures();

        engine.run(Invocation::new(13)).unwrap();
        pause(10).await;
        engine.run(Invocation::new(2)).unwrap();

        assert_eq!(*results.recv().await.unwrap().data, 20);
        assert!(matches!(failures.try_recv(), Err(TryRecvError::Empty)));
        assert_eq!(probe.cancels(), vec![13]);
        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn window_edge_dispatches_immediately() {
        let probe = Probe::new();
        let engine = engine(probed_op(&probe, |_| 0, |_| 1_000), 200);
        let mut events = engine.events();

        engine.run(Invocation::new(1).with_key("a").with_time(0)).unwrap();
        engine.run(Invocation::new(2).with_key("a").with_time(200)).unwrap();
        engine.run(Invocation::new(3).with_key("b").with_time(0)).unwrap();
        let inside = engine.run(Invocation::new(4).with_key("b").with_time(199)).unwrap();

        pause(300).await;
        let starts = probe.starts();
        assert!(starts.contains(&(2, 0)));
        // Start times are clock times: sequence 199 waits for its timer, armed
        // at t=0 for the 200ms window.
        assert!(starts.contains(&(4, 200)));
        assert!(drain_events(&mut events).contains(&(EventKind::DebounceScheduled, Some(inside))));
        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn older_invocation_arriving_late_is_dropped() {
        let probe = Probe::new();
        let engine = engine(probed_op(&probe, |_| 0, |_| 500), 200);
        let mut events = engine.events();

        engine.run(Invocation::new(1).with_time(1_000)).unwrap();
        let late = engine.run(Invocation::new(2).with_time(400)).unwrap();

        pause(10).await;
        assert_eq!(probe.starts(), vec![(1, 0)]);
        assert!(drain_events(&mut events).contains(&(EventKind::InvocationDropped, Some(late))));
        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn operation_panic_is_reported_as_failure() {
        let op: OperationRef<u32, u32> = OperationFn::arc(|p: u32| async move {
            if p == 1 {
                panic!("start exploded");
            }
            Ok::<_, OperationError>(Started::ready(p))
        });
        let engine = engine(op, 0);
        let mut failures = engine.failures();
        let mut results = engine.results();

        engine.run(Invocation::new(1)).unwrap();
        let failure = failures.recv().await.unwrap();
        assert!(matches!(&*failure.error, OperationError::Panicked { info } if info.contains("start exploded")));

        engine.run(Invocation::new(2)).unwrap();
        assert_eq!(*results.recv().await.unwrap().data, 2);
        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_in_flight_and_closes_handles() {
        let probe = Probe::new();
        let engine = engine(probed_op(&probe, |_| 0, |_| 500), 200);
        let handle = engine.handle();
        let loading = engine.is_loading();

        engine.run(Invocation::new(1)).unwrap();
        pause(10).await;
        engine.run(Invocation::new(2)).unwrap();
        pause(10).await;
        engine.shutdown().await;

        assert_eq!(probe.cancels(), vec![1]);
        assert!(!*loading.borrow());
        assert!(matches!(handle.run(Invocation::new(3)), Err(RunError::Closed)));

        pause(1_000).await;
        assert_eq!(probe.starts(), vec![(1, 0)]);
    }
}
