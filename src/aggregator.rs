// =============================================================================
// QuoteAggregator — adapter workers + bounded intake + batch processor
// (spec §4.4, §5)
// =============================================================================
//
// One long-running worker task per `ExchangeAdapter`, plus a single batch
// processor task, fanning into `QuoteStore`. Grounded on the teacher's
// `main.rs` stream-task shape (spawn one task per stream, sleep-then-retry
// on error) combined with the producer/consumer channel split in
// `other_examples/1b3dedce_...arbitrage-engine.rs.rs` (bounded channel,
// drain loop feeding a shared structure).
//
// Backpressure is expressed as loss, never as blocking: the worker uses
// `try_send` and increments a drop counter on `Full` rather than awaiting
// channel capacity (spec §4.4, §7 `StoreBackpressure`).
// =============================================================================

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::exchange::ExchangeAdapter;
use crate::status::StatusTracker;
use crate::store::QuoteStore;
use crate::symbol_mapper::SymbolMapper;
use crate::types::Quote;

const BACKOFF_BASE: Duration = Duration::from_secs(1);
const BACKOFF_CAP: Duration = Duration::from_secs(60);

/// Per-exchange drop/error counters exposed for observability and tests.
#[derive(Default)]
pub struct AggregatorCounters {
    pub drops: HashMap<String, Arc<AtomicU64>>,
}

pub struct QuoteAggregator {
    store: Arc<QuoteStore>,
    status: Arc<StatusTracker>,
    mapper: Arc<SymbolMapper>,
    intake_capacity: usize,
    batch_size: usize,
    quote_ttl_ms: i64,
    drop_counters: HashMap<String, Arc<AtomicU64>>,
}

impl QuoteAggregator {
    pub fn new(
        store: Arc<QuoteStore>,
        status: Arc<StatusTracker>,
        mapper: Arc<SymbolMapper>,
        intake_capacity: usize,
        batch_size: usize,
        quote_ttl_ms: i64,
        adapters: &[Arc<dyn ExchangeAdapter>],
    ) -> Self {
        let drop_counters = adapters
            .iter()
            .map(|a| (a.name().to_string(), Arc::new(AtomicU64::new(0))))
            .collect();
        Self {
            store,
            status,
            mapper,
            intake_capacity,
            batch_size,
            quote_ttl_ms,
            drop_counters,
        }
    }

    pub fn drop_count(&self, exchange: &str) -> u64 {
        self.drop_counters
            .get(exchange)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Spawn the adapter workers and the batch processor. Returns their join
    /// handles so the caller can await clean shutdown. `target_symbols` is
    /// re-read from `shared_targets` on every poll so the tracked universe
    /// can grow as `SymbolMapper::intersection()` discovers more overlap.
    pub fn spawn(
        self: &Arc<Self>,
        adapters: Vec<Arc<dyn ExchangeAdapter>>,
        shared_targets: Arc<parking_lot::RwLock<Vec<String>>>,
        shutdown: Arc<tokio::sync::Notify>,
    ) -> Vec<tokio::task::JoinHandle<()>> {
        let (tx, rx) = mpsc::channel::<(String, Quote)>(self.intake_capacity);

        let mut handles = Vec::new();

        for adapter in adapters {
            let tx = tx.clone();
            let mapper = self.mapper.clone();
            let status = self.status.clone();
            let targets = shared_targets.clone();
            let drop_counter = self
                .drop_counters
                .get(adapter.name())
                .cloned()
                .unwrap_or_else(|| Arc::new(AtomicU64::new(0)));
            let shutdown = shutdown.clone();

            handles.push(tokio::spawn(Self::run_adapter_worker(
                adapter,
                mapper,
                status,
                targets,
                tx,
                drop_counter,
                shutdown,
            )));
        }

        // Drop the aggregator's own sender clone so the channel closes once
        // every worker has exited.
        drop(tx);

        let store = self.store.clone();
        let status = self.status.clone();
        let batch_size = self.batch_size;
        let quote_ttl_ms = self.quote_ttl_ms;
        let shutdown_bp = shutdown;
        handles.push(tokio::spawn(Self::run_batch_processor(
            rx,
            store,
            status,
            batch_size,
            quote_ttl_ms,
            shutdown_bp,
        )));

        handles
    }

    /// One adapter's worker loop: poll on cadence, enqueue non-blockingly,
    /// back off exponentially (capped) on failure, never terminate.
    async fn run_adapter_worker(
        adapter: Arc<dyn ExchangeAdapter>,
        mapper: Arc<SymbolMapper>,
        status: Arc<StatusTracker>,
        targets: Arc<parking_lot::RwLock<Vec<String>>>,
        tx: mpsc::Sender<(String, Quote)>,
        drop_counter: Arc<AtomicU64>,
        shutdown: Arc<tokio::sync::Notify>,
    ) {
        let name = adapter.name().to_string();
        let mut backoff = BACKOFF_BASE;

        loop {
            let target_symbols = targets.read().clone();
            match adapter.poll(&mapper, &target_symbols).await {
                Ok(quotes) => {
                    backoff = BACKOFF_BASE;
                    let now_ms = Utc::now().timestamp_millis();
                    let mut enqueued = 0usize;
                    for quote in quotes {
                        match tx.try_send((name.clone(), quote)) {
                            Ok(()) => enqueued += 1,
                            Err(mpsc::error::TrySendError::Full(_)) => {
                                drop_counter.fetch_add(1, Ordering::Relaxed);
                                warn!(exchange = %name, "intake channel full — quote dropped");
                            }
                            Err(mpsc::error::TrySendError::Closed(_)) => {
                                info!(exchange = %name, "intake channel closed — stopping worker");
                                return;
                            }
                        }
                    }
                    debug!(exchange = %name, enqueued, "poll cycle complete");
                    // quote_count is refreshed by the batch processor; this
                    // call only flips connectivity + last_update_ms.
                    status.record_success(&name, now_ms, status.snapshot()
                        .get(&name)
                        .map(|s| s.quote_count)
                        .unwrap_or(0));
                    tokio::select! {
                        _ = sleep(adapter.poll_interval()) => {}
                        _ = shutdown.notified() => break,
                    }
                }
                Err(e) => {
                    error!(exchange = %name, error = %e, backoff_secs = backoff.as_secs(), "poll failed, backing off");
                    status.record_error(&name, e.to_string());
                    tokio::select! {
                        _ = sleep(backoff) => {}
                        _ = shutdown.notified() => break,
                    }
                    backoff = (backoff * 2).min(BACKOFF_CAP);
                }
            }
        }

        info!(exchange = %name, "adapter worker shut down");
    }

    /// Drains up to `batch_size` items, applies them atomically, repeats.
    /// Suspends on an empty channel rather than polling.
    async fn run_batch_processor(
        mut rx: mpsc::Receiver<(String, Quote)>,
        store: Arc<QuoteStore>,
        status: Arc<StatusTracker>,
        batch_size: usize,
        quote_ttl_ms: i64,
        shutdown: Arc<tokio::sync::Notify>,
    ) {
        loop {
            let mut batch = Vec::with_capacity(batch_size);

            let first = tokio::select! {
                item = rx.recv() => item,
                _ = shutdown.notified() => None,
            };

            let Some(first) = first else {
                info!("batch processor: channel closed or shutdown requested");
                break;
            };
            batch.push(first);

            while batch.len() < batch_size {
                match rx.try_recv() {
                    Ok(item) => batch.push(item),
                    Err(_) => break,
                }
            }

            let mut touched_exchanges: Vec<String> = batch
                .iter()
                .map(|(ex, _)| ex.clone())
                .collect::<std::collections::HashSet<_>>()
                .into_iter()
                .collect();
            touched_exchanges.sort();

            let batch_len = batch.len();
            store.upsert_batch(batch);

            let now_ms = Utc::now().timestamp_millis();
            for exchange in touched_exchanges {
                let fresh = store.count_fresh(&exchange, now_ms, quote_ttl_ms);
                status.refresh_quote_count(&exchange, fresh);
            }

            debug!(batch_len, "batch applied to store");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ArbError;
    use crate::types::FeeSchedule;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    struct FakeAdapter {
        name: String,
        calls: Arc<AtomicUsize>,
        quotes_per_call: Vec<Quote>,
        fail_first_n: usize,
    }

    #[async_trait]
    impl ExchangeAdapter for FakeAdapter {
        fn name(&self) -> &str {
            &self.name
        }
        fn fee_schedule(&self) -> FeeSchedule {
            FeeSchedule {
                taker_pct: 0.001,
                maker_pct: 0.001,
            }
        }
        fn poll_interval(&self) -> Duration {
            Duration::from_millis(5)
        }
        async fn poll(
            &self,
            _mapper: &SymbolMapper,
            _targets: &[String],
        ) -> Result<Vec<Quote>, ArbError> {
            let call_no = self.calls.fetch_add(1, Ordering::SeqCst);
            if call_no < self.fail_first_n {
                return Err(ArbError::TransientVenue {
                    exchange: self.name.clone(),
                    source: anyhow::anyhow!("simulated failure"),
                });
            }
            Ok(self.quotes_per_call.clone())
        }
    }

    fn sample_quote(exchange: &str, symbol: &str) -> Quote {
        Quote {
            exchange: exchange.to_string(),
            venue_symbol: symbol.to_string(),
            canonical_symbol: symbol.to_string(),
            bid: 100.0,
            ask: 101.0,
            last: 100.5,
            timestamp_ms: Utc::now().timestamp_millis(),
        }
    }

    #[tokio::test]
    async fn successful_poll_lands_in_store() {
        let store = Arc::new(QuoteStore::new());
        let status = Arc::new(StatusTracker::new(["fake".to_string()]));
        let mapper = Arc::new(SymbolMapper::new(HashMap::new()));
        let adapter: Arc<dyn ExchangeAdapter> = Arc::new(FakeAdapter {
            name: "fake".to_string(),
            calls: Arc::new(AtomicUsize::new(0)),
            quotes_per_call: vec![sample_quote("fake", "BTCUSDT")],
            fail_first_n: 0,
        });

        let aggregator = Arc::new(QuoteAggregator::new(
            store.clone(),
            status.clone(),
            mapper,
            100,
            10,
            15_000,
            std::slice::from_ref(&adapter),
        ));

        let targets = Arc::new(parking_lot::RwLock::new(vec!["BTCUSDT".to_string()]));
        let shutdown = Arc::new(tokio::sync::Notify::new());
        let handles = aggregator.spawn(vec![adapter], targets, shutdown);

        tokio::time::sleep(Duration::from_millis(50)).await;

        let snap = store.snapshot();
        assert!(snap.contains_key(&("fake".to_string(), "BTCUSDT".to_string())));

        for h in handles {
            h.abort();
        }
    }

    #[tokio::test]
    async fn intake_overflow_increments_drop_counter() {
        let store = Arc::new(QuoteStore::new());
        let status = Arc::new(StatusTracker::new(["fake".to_string()]));
        let mapper = Arc::new(SymbolMapper::new(HashMap::new()));

        // One poll emits far more quotes than the tiny intake capacity.
        let many_quotes: Vec<Quote> = (0..50)
            .map(|i| sample_quote("fake", &format!("SYM{i}USDT")))
            .collect();

        let adapter: Arc<dyn ExchangeAdapter> = Arc::new(FakeAdapter {
            name: "fake".to_string(),
            calls: Arc::new(AtomicUsize::new(0)),
            quotes_per_call: many_quotes,
            fail_first_n: 0,
        });

        let aggregator = Arc::new(QuoteAggregator::new(
            store.clone(),
            status.clone(),
            mapper,
            // Small capacity forces overflow from a single 50-quote poll.
            4,
            2,
            15_000,
            std::slice::from_ref(&adapter),
        ));

        let targets = Arc::new(parking_lot::RwLock::new(Vec::new()));
        let shutdown = Arc::new(tokio::sync::Notify::new());
        let handles = aggregator.spawn(vec![adapter], targets, shutdown);

        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(aggregator.drop_count("fake") > 0);

        for h in handles {
            h.abort();
        }
    }
}
