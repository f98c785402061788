//! # Example: product_cards
//!
//! Several product cards, each re-fetching its price whenever the quantity
//! changes. Edits on one card are debounced and only the latest quantity's
//! price is shown; edits on different cards never interfere.
//!
//! Shows how to:
//! - Wrap a cancellable fetch with [`OperationFn`] and [`Started::with_token`].
//! - Key invocations per card.
//! - Observe `is_loading` and per-key results.
//! - Attach the built-in [`LogWriter`] through `tracing`.
//!
//! ## Flow
//! ```text
//! card-1: qty 1 (t=0) ── qty 2 (t=50) ── qty 3 (t=100)
//!           │ immediate      └── coalesced ──┘ fires at t=300
//!           ▼                                 ▼
//!        fetch(1) ──────── cancelled ───── fetch(3) ──► price shown
//! card-2: qty 5 (t=20) ─► fetch(5) ──► price shown
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example product_cards
//! ```

use std::{sync::Arc, time::Duration};

use supersede::{
    Config, Debouncer, Invocation, LogWriter, OperationError, OperationFn, OperationRef, Started,
    Subscribe,
};
use tokio_util::sync::CancellationToken;

/// Simulated price lookup: 500ms round trip, honours cancellation.
fn price_lookup() -> OperationRef<u32, u64> {
    OperationFn::arc(|qty: u32| async move {
        let token = CancellationToken::new();
        let call = token.clone();
        let result = async move {
            tokio::select! {
                _ = call.cancelled() => Err(OperationError::Canceled),
                _ = tokio::time::sleep(Duration::from_millis(500)) => Ok(u64::from(qty) * 1_299),
            }
        };
        Ok::<_, OperationError>(Started::new(result).with_token(token))
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_target(true)
        .init();

    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let engine = Debouncer::builder(price_lookup())
        .source("product-cards")
        .config(Config::with_debounce_ms(200))
        .with_subscribers(subs)
        .build();

    let mut results = engine.results();
    let mut loading = engine.is_loading();
    let ui = tokio::spawn(async move {
        while loading.changed().await.is_ok() {
            println!("[ui] loading = {}", *loading.borrow_and_update());
        }
    });

    engine.run(Invocation::new(1).with_key("card-1"))?;
    tokio::time::sleep(Duration::from_millis(20)).await;
    engine.run(Invocation::new(5).with_key("card-2"))?;
    tokio::time::sleep(Duration::from_millis(30)).await;
    engine.run(Invocation::new(2).with_key("card-1"))?;
    tokio::time::sleep(Duration::from_millis(50)).await;
    engine.run(Invocation::new(3).with_key("card-1"))?;

    for _ in 0..2 {
        let delivered = results.recv().await?;
        println!(
            "[ui] {} price = {} (sequence {})",
            delivered.key, delivered.data, delivered.sequence
        );
    }

    engine.shutdown().await;
    ui.abort();
    Ok(())
}
