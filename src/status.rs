// =============================================================================
// StatusTracker — per-exchange health, independently locked (spec §4.5)
// =============================================================================
//
// Deliberately a separate `parking_lot::RwLock` from `QuoteStore`'s, so a
// status read never queues behind a quote-store write or vice versa — the
// same separation-of-concerns the teacher keeps between `AppState`'s
// `recent_errors` lock and its market-data locks.
// =============================================================================

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::types::ExchangeStatus;

pub struct StatusTracker {
    inner: RwLock<HashMap<String, ExchangeStatus>>,
}

impl StatusTracker {
    pub fn new(exchange_names: impl IntoIterator<Item = String>) -> Self {
        let mut map = HashMap::new();
        for name in exchange_names {
            map.insert(name.clone(), ExchangeStatus::new(name));
        }
        Self {
            inner: RwLock::new(map),
        }
    }

    /// Record a successful poll: marks the exchange connected, refreshes
    /// `last_update_ms`, and sets `quote_count` to the caller-supplied fresh
    /// count (typically `QuoteStore::count_fresh`). `error_count` is
    /// retained across successful polls (spec §8 scenario 6).
    pub fn record_success(&self, exchange: &str, now_ms: i64, quote_count: usize) {
        let mut map = self.inner.write();
        let entry = map
            .entry(exchange.to_string())
            .or_insert_with(|| ExchangeStatus::new(exchange));
        entry.connected = true;
        entry.last_update_ms = now_ms;
        entry.quote_count = quote_count;
    }

    /// Record a failed poll: marks the exchange disconnected, increments
    /// `error_count`, and stores `error` as `last_error`.
    pub fn record_error(&self, exchange: &str, error: impl Into<String>) {
        let mut map = self.inner.write();
        let entry = map
            .entry(exchange.to_string())
            .or_insert_with(|| ExchangeStatus::new(exchange));
        entry.connected = false;
        entry.error_count += 1;
        entry.last_error = Some(error.into());
    }

    /// Refresh `quote_count` for `exchange` without touching connectivity or
    /// error fields — used when the batch processor recomputes freshness
    /// from the store on a cadence independent of poll success/failure.
    pub fn refresh_quote_count(&self, exchange: &str, quote_count: usize) {
        let mut map = self.inner.write();
        if let Some(entry) = map.get_mut(exchange) {
            entry.quote_count = quote_count;
        }
    }

    /// Immutable snapshot of all tracked exchange statuses.
    pub fn snapshot(&self) -> HashMap<String, ExchangeStatus> {
        self.inner.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_tracker_starts_disconnected() {
        let tracker = StatusTracker::new(["binance".to_string()]);
        let snap = tracker.snapshot();
        assert!(!snap["binance"].connected);
        assert_eq!(snap["binance"].error_count, 0);
    }

    #[test]
    fn crash_then_recovery_retains_error_count() {
        let tracker = StatusTracker::new(["binance".to_string()]);
        for _ in 0..5 {
            tracker.record_error("binance", "timeout");
        }
        {
            let snap = tracker.snapshot();
            assert!(!snap["binance"].connected);
            assert_eq!(snap["binance"].error_count, 5);
            assert_eq!(snap["binance"].last_error.as_deref(), Some("timeout"));
        }

        tracker.record_success("binance", 5000, 3);
        let snap = tracker.snapshot();
        assert!(snap["binance"].connected);
        assert_eq!(snap["binance"].last_update_ms, 5000);
        assert_eq!(snap["binance"].error_count, 5, "error count must survive recovery");
        assert_eq!(snap["binance"].quote_count, 3);
    }

    #[test]
    fn refresh_quote_count_does_not_touch_connectivity() {
        let tracker = StatusTracker::new(["binance".to_string()]);
        tracker.record_error("binance", "boom");
        tracker.refresh_quote_count("binance", 7);
        let snap = tracker.snapshot();
        assert!(!snap["binance"].connected);
        assert_eq!(snap["binance"].quote_count, 7);
    }
}
