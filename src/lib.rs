//! # supersede
//!
//! **Supersede** wraps an asynchronous, cancellable operation so that, per
//! key, only the most recent invocation's result is ever delivered.
//!
//! Rapid invocations are debounced, older in-flight operations are cancelled
//! when a newer one becomes active, and late results of superseded
//! invocations are discarded. Typical use: many independent UI cards, each
//! firing "fetch latest data" on every edit.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   run(Invocation)      run(Invocation)      run(Invocation)
//!   key = "card-1"       key = "card-2"       key = "card-1"
//!          │                    │                    │
//!          ▼                    ▼                    ▼
//!       ┌───────────────────────────────────────────────┐
//!       │ Sequencer (engine clock, strictly increasing) │
//!       └──────────────────────┬────────────────────────┘
//!                              ▼  Command::Run
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Dispatcher (single task, owns every keyed table)                 │
//! │  - Debounce      key → pending invocation + timer                 │
//! │  - Initializing  key → sequence whose start is in progress        │
//! │  - Active        key → awaited operation + cancel handle          │
//! │  - LoadingView   union of keys → loading_keys / is_loading        │
//! └──────┬──────────────────┬──────────────────┬───────────────┬──────┘
//!        ▼                  ▼                  ▼               │
//!   ┌──────────┐      ┌──────────┐      ┌──────────────┐       │
//!   │  timer   │      │  start   │      │ result watch │       │
//!   │  tasks   │      │  tasks   │      │    tasks     │       │
//!   └────┬─────┘      └────┬─────┘      └──────┬───────┘       │
//!        │ DebounceElapsed │ StartDone         │ Settled       │
//!        └─────────────────┴───────────────────┘               │
//!                  (posted back to the dispatcher)             ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        Bus (broadcast channel)                    │
//! │                   (capacity: Config::bus_capacity)                │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                       ┌────────────────────────┐
//!                       │  subscriber_listener   │
//!                       └───────────┬────────────┘
//!                                   ▼
//!                             SubscriberSet
//!                           (per-sub queues)
//!                         ┌─────────┼─────────┐
//!                         ▼         ▼         ▼
//!                     LogWriter  worker2   workerN
//! ```
//!
//! ### Lifecycle of one invocation
//! ```text
//! run ─► sequence ─► superseded? ─► dropped
//!                      │
//!                      ├─ within window of last dispatch ► Debounce ─► (timer) ┐
//!                      │                                                      │
//!                      └─ otherwise ───────────────────────────────────────► Initializing
//!                                                                             │ start()
//!                                      newer started meanwhile ◄── Dead/Old ──┤
//!                                      (started op cancelled)                 │ Current
//!                                                                             ▼
//!                                                                           Active
//!                                                        (previous Active cancelled once)
//!                                                                             │ result
//!                                                 still current? ─ no ─► discarded
//!                                                        │ yes
//!                                                        └─► results() / failures()
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types / traits                         |
//! |-------------------|---------------------------------------------------------------|--------------------------------------------|
//! | **Engine**        | Per-key debounce, latest-wins dispatch, loading observables.  | [`Debouncer`], [`RunHandle`]               |
//! | **Operations**    | Startable async work with optional cancellation.              | [`Operation`], [`OperationFn`], [`Started`]|
//! | **Invocations**   | Keyed, sequenced requests and their outcomes.                 | [`Invocation`], [`Delivery`], [`Failure`]  |
//! | **Subscriber API**| Hook into lifecycle events (logging, metrics, custom).        | [`Subscribe`], [`LogWriter`]               |
//! | **Errors**        | Typed errors for operations and submission.                   | [`OperationError`], [`RunError`]           |
//! | **Configuration** | Debounce window and channel capacities.                       | [`Config`]                                 |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use supersede::{
//!     Config, Debouncer, Invocation, LogWriter, OperationError, OperationFn, OperationRef,
//!     Started, Subscribe,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let fetch: OperationRef<u32, String> = OperationFn::arc(|id: u32| async move {
//!         Ok::<_, OperationError>(Started::new(async move {
//!             tokio::time::sleep(Duration::from_millis(10)).await;
//!             Ok(format!("product #{id}"))
//!         }))
//!     });
//!
//!     let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::default())];
//!     let engine = Debouncer::builder(fetch)
//!         .source("product-cards")
//!         .config(Config::with_debounce_ms(200))
//!         .with_subscribers(subs)
//!         .build();
//!
//!     let mut results = engine.results();
//!     engine.run(Invocation::new(7).with_key("card-1"))?;
//!
//!     let delivered = results.recv().await?;
//!     assert_eq!(delivered.data.as_str(), "product #7");
//!
//!     engine.shutdown().await;
//!     Ok(())
//! }
//! ```
mod config;
mod core;
mod error;
mod events;
mod operation;
mod subscribers;

// ---- Public re-exports ----

pub use config::Config;
pub use core::{
    Debouncer, DebouncerBuilder, Delivery, Failure, FailureStage, Invocation, Key, RunHandle,
    Sequence,
};
pub use error::{OperationError, RunError};
pub use events::{Bus, Event, EventKind};
pub use operation::{
    BoxResultFuture, BoxStartFuture, CancelHandle, Operation, OperationFn, OperationRef, Started,
};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
