//! # Dispatcher: the per-engine state machine.
//!
//! One task owns the three keyed tables and drains a command channel, so every
//! read-modify-write of a key's entries is linearized. Timers, start routines
//! and result waits run in spawned tasks that post commands back.
//!
//! ## Command flow
//! ```text
//! Run(reg) ─────────────► superseded by any table? ── yes ─► InvocationDropped
//!                              │ no
//!                              ▼
//!       within window of last dispatch? ── yes ─► Debounce table + timer task
//!                              │ no                         │
//!                              │                 DebounceElapsed(key, seq)
//!                              │                            │
//!                              │                 take_if + admits? ── no ─► InvocationDropped
//!                              ▼                            │ yes
//!                        Initializing ◄─────────────────────┘
//!                              │  spawn: op.start(payload)
//!                              ▼
//! StartDone(key, seq, res) ──► Err            → clear if ours, Failure(Start)
//!                              Ok + Dead/Old  → cancel started operation
//!                              Ok + Current   → Active (replaced entry cancelled)
//!                                                 │ spawn: await result (until watch cancelled)
//!                                                 ▼
//! Settled(key, seq, res) ────► still current? ── no ─► ResultDiscarded
//!                                   │ yes
//!                                   ├─ Ok  → Delivery
//!                                   └─ Err → Failure(Settle)
//! ```
//!
//! ## Rules
//! - A higher sequence for a key always evicts a lower one, at whichever stage it sits.
//! - The quiet period runs from the last dispatch, even if that operation already settled.
//! - A start whose completion cannot reach the dispatcher is cancelled by its task.
//! - Panics in the operation are caught and reported as [`OperationError::Panicked`].

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use crate::core::active::{ActiveEntry, ActiveTable};
use crate::core::admission;
use crate::core::debounce::{DebounceTable, DebouncedEntry};
use crate::core::dispatched::DispatchLog;
use crate::core::initializing::{InitializingTable, StartVerdict};
use crate::core::invocation::{Delivery, Failure, FailureStage, Key, Registered, Sequence};
use crate::core::sequencer::Sequencer;
use crate::core::view::LoadingView;
use crate::error::OperationError;
use crate::events::{Bus, Event, EventKind};
use crate::operation::{BoxStartFuture, OperationRef, Started};

/// Messages processed by the dispatcher, in arrival order.
pub(crate) enum Command<P, D> {
    Run(Registered<P>),
    DebounceElapsed {
        key: Key,
        sequence: Sequence,
    },
    StartDone {
        key: Key,
        sequence: Sequence,
        outcome: Result<Started<D>, OperationError>,
    },
    Settled {
        key: Key,
        sequence: Sequence,
        outcome: Result<D, OperationError>,
    },
}

pub(crate) struct DispatcherParams<P, D> {
    pub source: Arc<str>,
    pub debounce: Duration,
    pub operation: OperationRef<P, D>,
    pub bus: Bus,
    pub results: broadcast::Sender<Delivery<D>>,
    pub failures: broadcast::Sender<Failure>,
    pub view: LoadingView,
    pub sequencer: Arc<Sequencer>,
    pub tx: mpsc::UnboundedSender<Command<P, D>>,
    pub runtime: CancellationToken,
}

pub(crate) struct Dispatcher<P, D> {
    source: Arc<str>,
    debounce: Duration,
    window: u64,
    operation: OperationRef<P, D>,
    debounced: DebounceTable<P>,
    initializing: InitializingTable,
    active: ActiveTable,
    dispatched: DispatchLog,
    sequencer: Arc<Sequencer>,
    view: LoadingView,
    bus: Bus,
    results: broadcast::Sender<Delivery<D>>,
    failures: broadcast::Sender<Failure>,
    tx: mpsc::UnboundedSender<Command<P, D>>,
    runtime: CancellationToken,
}

impl<P, D> Dispatcher<P, D>
where
    P: Send + 'static,
    D: Send + Sync + 'static,
{
    pub(crate) fn new(params: DispatcherParams<P, D>) -> Self {
        let window = params.debounce.as_millis().min(u128::from(u64::MAX)) as u64;
        Self {
            source: params.source,
            debounce: params.debounce,
            window,
            operation: params.operation,
            debounced: DebounceTable::new(),
            initializing: InitializingTable::new(),
            active: ActiveTable::new(),
            dispatched: DispatchLog::new(),
            sequencer: params.sequencer,
            view: params.view,
            bus: params.bus,
            results: params.results,
            failures: params.failures,
            tx: params.tx,
            runtime: params.runtime,
        }
    }

    /// Drains commands until the runtime token is cancelled, then tears down.
    pub(crate) async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command<P, D>>) {
        let runtime = self.runtime.clone();
        loop {
            let cmd = tokio::select! {
                biased;
                _ = runtime.cancelled() => break,
                cmd = rx.recv() => match cmd {
                    Some(cmd) => cmd,
                    None => break,
                },
            };
            self.handle(cmd);
            self.refresh_view();
        }

        rx.close();
        while let Ok(cmd) = rx.try_recv() {
            if let Command::StartDone {
                outcome: Ok(started),
                ..
            } = cmd
            {
                started.cancel();
            }
        }
        self.teardown();
    }

    fn handle(&mut self, cmd: Command<P, D>) {
        match cmd {
            Command::Run(reg) => self.on_registered(reg),
            Command::DebounceElapsed { key, sequence } => self.on_debounce_elapsed(key, sequence),
            Command::StartDone {
                key,
                sequence,
                outcome,
            } => self.on_start_done(key, sequence, outcome),
            Command::Settled {
                key,
                sequence,
                outcome,
            } => self.on_settled(key, sequence, outcome),
        }
    }

    // ---------------------------
    // Admission + debounce
    // ---------------------------

    fn on_registered(&mut self, reg: Registered<P>) {
        self.publish(EventKind::InvocationRegistered, &reg.key, reg.sequence);
        self.prune_dispatched();

        let key = &reg.key;
        let init = self.initializing.sequence_of(key);
        let active = self.active.sequence_of(key);

        if admission::is_newer(self.debounced.sequence_of(key), reg.sequence)
            || !admission::admits(reg.sequence, init, active)
        {
            self.drop_invocation(key, reg.sequence, "superseded on arrival");
            return;
        }

        let dispatched = self.dispatched.last(key);
        if admission::bypasses_debounce(reg.sequence, self.window, init, active, dispatched) {
            if let Some(pending) = self.debounced.force_remove(key) {
                self.drop_invocation(key, pending, "bypassed by immediate dispatch");
            }
            self.enter_initializing(reg);
        } else {
            self.schedule(reg);
        }
    }

    fn schedule(&mut self, reg: Registered<P>) {
        let timer = self.runtime.child_token();
        self.spawn_timer(reg.key.clone(), reg.sequence, timer.clone());

        self.bus.publish(
            self.event(EventKind::DebounceScheduled, &reg.key, reg.sequence)
                .with_delay(self.debounce),
        );

        let entry = DebouncedEntry {
            sequence: reg.sequence,
            payload: reg.payload,
            timer,
        };
        if let Some(prev) = self.debounced.submit(reg.key.clone(), entry) {
            self.drop_invocation(&reg.key, prev.sequence, "coalesced into a newer invocation");
        }
    }

    fn spawn_timer(&self, key: Key, sequence: Sequence, timer: CancellationToken) {
        let tx = self.tx.clone();
        let delay = self.debounce;
        tokio::spawn(async move {
            tokio::select! {
                _ = timer.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let _ = tx.send(Command::DebounceElapsed { key, sequence });
                }
            }
        });
    }

    fn on_debounce_elapsed(&mut self, key: Key, sequence: Sequence) {
        let Some(reg) = self.debounced.take_if(&key, sequence) else {
            return;
        };
        let init = self.initializing.sequence_of(&key);
        let active = self.active.sequence_of(&key);

        if admission::admits(sequence, init, active) {
            self.publish(EventKind::DebounceElapsed, &key, sequence);
            self.enter_initializing(reg);
        } else {
            self.drop_invocation(&key, sequence, "superseded after debounce");
        }
    }

    // ---------------------------
    // Initialization
    // ---------------------------

    fn enter_initializing(&mut self, reg: Registered<P>) {
        let Registered {
            key,
            sequence,
            payload,
        } = reg;

        if !self.initializing.enter(&key, sequence) {
            self.drop_invocation(&key, sequence, "newer invocation initializing");
            return;
        }
        self.dispatched.record(&key, sequence);
        self.publish(EventKind::StartRequested, &key, sequence);

        let operation = Arc::clone(&self.operation);
        let start: BoxStartFuture<D> =
            match std::panic::catch_unwind(AssertUnwindSafe(|| operation.start(payload))) {
                Ok(fut) => fut,
                Err(panic) => Box::pin(std::future::ready(Err(OperationError::panicked(panic)))),
            };

        let tx = self.tx.clone();
        let runtime = self.runtime.clone();
        tokio::spawn(async move {
            let outcome = tokio::select! {
                _ = runtime.cancelled() => return,
                res = AssertUnwindSafe(start).catch_unwind() => {
                    res.unwrap_or_else(|panic| Err(OperationError::panicked(panic)))
                }
            };
            let cmd = Command::StartDone {
                key,
                sequence,
                outcome,
            };
            if let Err(mpsc::error::SendError(Command::StartDone {
                outcome: Ok(started),
                ..
            })) = tx.send(cmd)
            {
                started.cancel();
            }
        });
    }

    fn on_start_done(
        &mut self,
        key: Key,
        sequence: Sequence,
        outcome: Result<Started<D>, OperationError>,
    ) {
        let started = match outcome {
            Ok(started) => started,
            Err(error) => {
                let owned = self.initializing.finish(&key, sequence);
                self.bus.publish(
                    self.event(EventKind::StartFailed, &key, sequence)
                        .with_reason(error.to_string()),
                );
                if owned {
                    self.fail(key, sequence, FailureStage::Start, error);
                }
                return;
            }
        };

        let active = self.active.sequence_of(&key);
        match self.initializing.resolve(&key, sequence, active) {
            StartVerdict::Dead => {
                started.cancel();
                self.publish(EventKind::StartDead, &key, sequence);
            }
            StartVerdict::Old => {
                started.cancel();
                self.publish(EventKind::StartStale, &key, sequence);
            }
            StartVerdict::Current => self.activate(key, sequence, started),
        }
    }

    // ---------------------------
    // Active
    // ---------------------------

    fn activate(&mut self, key: Key, sequence: Sequence, started: Started<D>) {
        let (cancel, result) = started.into_parts();
        let watch = self.runtime.child_token();
        let entry = ActiveEntry {
            sequence,
            cancel,
            watch: watch.clone(),
        };

        if let Some(replaced) = self.active.insert(key.clone(), entry) {
            let replaced_seq = replaced.sequence;
            replaced.cancel();
            self.publish(EventKind::OperationReplaced, &key, replaced_seq);
        }
        self.publish(EventKind::OperationActivated, &key, sequence);

        let tx = self.tx.clone();
        tokio::spawn(async move {
            let outcome = tokio::select! {
                _ = watch.cancelled() => return,
                res = AssertUnwindSafe(result).catch_unwind() => {
                    res.unwrap_or_else(|panic| Err(OperationError::panicked(panic)))
                }
            };
            let _ = tx.send(Command::Settled {
                key,
                sequence,
                outcome,
            });
        });
    }

    fn on_settled(&mut self, key: Key, sequence: Sequence, outcome: Result<D, OperationError>) {
        if !self.active.remove_current(&key, sequence) {
            self.publish(EventKind::ResultDiscarded, &key, sequence);
            return;
        }

        match outcome {
            Ok(data) => {
                self.publish(EventKind::ResultDelivered, &key, sequence);
                let _ = self.results.send(Delivery {
                    key,
                    sequence,
                    data: Arc::new(data),
                });
            }
            Err(error) => {
                self.bus.publish(
                    self.event(EventKind::OperationFailed, &key, sequence)
                        .with_reason(error.to_string()),
                );
                self.fail(key, sequence, FailureStage::Settle, error);
            }
        }
    }

    // ---------------------------
    // Helpers
    // ---------------------------

    fn fail(&self, key: Key, sequence: Sequence, stage: FailureStage, error: OperationError) {
        let _ = self.failures.send(Failure {
            key,
            sequence,
            stage,
            error: Arc::new(error),
        });
    }

    fn drop_invocation(&self, key: &Key, sequence: Sequence, reason: &'static str) {
        self.bus.publish(
            self.event(EventKind::InvocationDropped, key, sequence)
                .with_reason(reason),
        );
    }

    fn prune_dispatched(&mut self) {
        let (debounced, initializing, active) = (&self.debounced, &self.initializing, &self.active);
        self.dispatched.prune(self.sequencer.now(), self.window, |key| {
            debounced.sequence_of(key).is_some()
                || initializing.sequence_of(key).is_some()
                || active.sequence_of(key).is_some()
        });
    }

    fn refresh_view(&self) {
        self.view.publish(
            self.debounced
                .keys()
                .chain(self.initializing.keys())
                .chain(self.active.keys()),
        );
    }

    /// Cancels pending timers and in-flight operations, then empties every table.
    fn teardown(&mut self) {
        self.debounced.clear();
        self.active.cancel_all();
        self.initializing.clear();
        self.dispatched.clear();
        self.refresh_view();
        self.bus
            .publish(Event::new(EventKind::EngineStopped).with_source(Arc::clone(&self.source)));
    }

    fn event(&self, kind: EventKind, key: &Key, sequence: Sequence) -> Event {
        Event::new(kind)
            .with_source(Arc::clone(&self.source))
            .with_key(key.clone())
            .with_sequence(sequence)
    }

    fn publish(&self, kind: EventKind, key: &Key, sequence: Sequence) {
        self.bus.publish(self.event(kind, key, sequence));
    }
}
