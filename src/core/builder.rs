use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use super::debouncer::{Debouncer, DebouncerParts, RunHandle};
use super::dispatcher::{Dispatcher, DispatcherParams};
use super::sequencer::Sequencer;
use super::view::LoadingView;
use crate::{
    config::Config,
    events::Bus,
    operation::OperationRef,
    subscribers::{Subscribe, SubscriberSet},
};

/// Builder for constructing a [`Debouncer`].
pub struct DebouncerBuilder<P, D> {
    operation: OperationRef<P, D>,
    source: Arc<str>,
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl<P, D> DebouncerBuilder<P, D>
where
    P: Send + 'static,
    D: Send + Sync + 'static,
{
    /// Creates a builder with the default configuration.
    pub fn new(operation: OperationRef<P, D>) -> Self {
        Self {
            operation,
            source: Arc::from("debounce"),
            cfg: Config::default(),
            subscribers: Vec::new(),
        }
    }

    /// Sets the diagnostic id attached to every event of this engine.
    pub fn source(mut self, source: impl Into<Arc<str>>) -> Self {
        self.source = source.into();
        self
    }

    /// Sets the engine configuration.
    pub fn config(mut self, cfg: Config) -> Self {
        self.cfg = cfg;
        self
    }

    /// Sets event subscribers.
    ///
    /// Subscribers receive lifecycle events through dedicated workers with
    /// bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the engine and spawns its tasks.
    ///
    /// Must be called inside a tokio runtime.
    pub fn build(self) -> Debouncer<P, D> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let (results, _) = broadcast::channel(self.cfg.result_capacity_clamped());
        let (failures, _) = broadcast::channel(self.cfg.result_capacity_clamped());
        let (tx, rx) = mpsc::unbounded_channel();
        let runtime = CancellationToken::new();
        let listener_stop = CancellationToken::new();

        let sequencer = Arc::new(Sequencer::new());
        let view = LoadingView::new();
        let loading_keys = view.keys();
        let is_loading = view.loading();

        let listener = subscriber_listener(
            bus.clone(),
            SubscriberSet::new(self.subscribers, bus.clone()),
            listener_stop.clone(),
        );

        let dispatcher = Dispatcher::new(DispatcherParams {
            source: Arc::clone(&self.source),
            debounce: self.cfg.debounce,
            operation: self.operation,
            bus: bus.clone(),
            results: results.clone(),
            failures: failures.clone(),
            view,
            sequencer: Arc::clone(&sequencer),
            tx: tx.clone(),
            runtime: runtime.clone(),
        });
        let dispatcher = tokio::spawn(dispatcher.run(rx));

        tracing::debug!(
            source = %self.source,
            debounce_ms = self.cfg.debounce_window(),
            "engine started"
        );

        Debouncer::from_parts(DebouncerParts {
            source: self.source,
            handle: RunHandle::new(tx, sequencer, runtime.clone()),
            bus,
            results,
            failures,
            loading_keys,
            is_loading,
            runtime,
            listener_stop,
            dispatcher,
            listener,
        })
    }
}

/// Forwards bus events to the subscriber set until stopped, then drains and flushes.
fn subscriber_listener(
    bus: Bus,
    set: SubscriberSet,
    stop: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    let mut rx = bus.subscribe();
    drop(bus);
    tokio::spawn(async move {
        if set.is_empty() {
            return;
        }
        loop {
            tokio::select! {
                biased;
                msg = rx.recv() => match msg {
                    Ok(ev) => set.emit(Arc::new(ev)),
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "subscriber listener lagged");
                    }
                },
                _ = stop.cancelled() => {
                    while let Ok(ev) = rx.try_recv() {
                        set.emit(Arc::new(ev));
                    }
                    break;
                }
            }
        }
        set.shutdown().await;
    })
}
