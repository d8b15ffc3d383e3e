// =============================================================================
// StabilityTracker — rolling per-(pair, direction) history (spec §3, §4.6)
// =============================================================================
//
// A `VecDeque`-backed ring per key, trimmed by age rather than count —
// the same shape as the teacher's `CandleBuffer` ring (`market_data/
// candle_buffer.rs`) but windowed on elapsed time instead of a fixed
// capacity, since samples arrive once per engine tick rather than once per
// candle close.
// =============================================================================

use std::collections::{HashMap, VecDeque};

use parking_lot::RwLock;

/// `(canonical_symbol, buy_exchange, sell_exchange)`.
pub type DirectionKey = (String, String, String);

#[derive(Debug, Clone, Copy)]
struct Sample {
    timestamp_ms: i64,
    net_spread_pct: f64,
}

pub struct StabilityTracker {
    window_ms: i64,
    history: RwLock<HashMap<DirectionKey, VecDeque<Sample>>>,
}

impl StabilityTracker {
    pub fn new(window_minutes: u32) -> Self {
        Self {
            window_ms: i64::from(window_minutes) * 60_000,
            history: RwLock::new(HashMap::new()),
        }
    }

    /// Record a fresh sample for `key` and evict anything older than the
    /// window. Returns whether the direction is currently stable: every
    /// retained sample is net-positive *and* the oldest retained sample is
    /// at or before `now_ms - window_ms` (the window is fully covered).
    pub fn record(&self, key: DirectionKey, now_ms: i64, net_spread_pct: f64) -> bool {
        let mut history = self.history.write();
        let ring = history.entry(key).or_default();

        ring.push_back(Sample {
            timestamp_ms: now_ms,
            net_spread_pct,
        });

        let cutoff = now_ms - self.window_ms;
        while let Some(front) = ring.front() {
            if front.timestamp_ms < cutoff {
                ring.pop_front();
            } else {
                break;
            }
        }

        let window_fully_covered = ring
            .front()
            .is_some_and(|oldest| oldest.timestamp_ms <= cutoff + 1);
        let all_positive = !ring.is_empty() && ring.iter().all(|s| s.net_spread_pct > 0.0);

        window_fully_covered && all_positive
    }

    /// Whether `key` is currently stable without recording a new sample.
    /// Missing history defaults to `false` (spec §4.6 "Failure semantics").
    pub fn is_stable(&self, key: &DirectionKey, now_ms: i64) -> bool {
        let history = self.history.read();
        let Some(ring) = history.get(key) else {
            return false;
        };
        let cutoff = now_ms - self.window_ms;
        let window_fully_covered = ring
            .front()
            .is_some_and(|oldest| oldest.timestamp_ms <= cutoff + 1);
        let all_positive = !ring.is_empty() && ring.iter().all(|s| s.net_spread_pct > 0.0);
        window_fully_covered && all_positive
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> DirectionKey {
        ("BTCUSDT".to_string(), "binance".to_string(), "kraken".to_string())
    }

    #[test]
    fn not_stable_before_window_fills() {
        let tracker = StabilityTracker::new(5);
        assert!(!tracker.record(key(), 0, 0.2));
        assert!(!tracker.record(key(), 60_000, 0.2));
    }

    #[test]
    fn stable_once_window_is_fully_positive() {
        let tracker = StabilityTracker::new(5);
        let window_ms = 5 * 60_000;
        let mut stable = false;
        let mut t = 0;
        while t <= window_ms {
            stable = tracker.record(key(), t, 0.2);
            t += 1000;
        }
        assert!(stable, "window fully covered with positive samples must be stable");
    }

    #[test]
    fn one_negative_sample_breaks_stability_immediately() {
        let tracker = StabilityTracker::new(5);
        let window_ms = 5 * 60_000;
        let mut t = 0;
        while t <= window_ms {
            tracker.record(key(), t, 0.2);
            t += 1000;
        }
        assert!(tracker.is_stable(&key(), t - 1000));

        let unstable = tracker.record(key(), t, -0.1);
        assert!(!unstable, "a single negative sample must flip stability to false");
    }

    #[test]
    fn missing_key_defaults_to_unstable() {
        let tracker = StabilityTracker::new(5);
        assert!(!tracker.is_stable(&key(), 10_000));
    }

    #[test]
    fn old_samples_are_evicted() {
        let tracker = StabilityTracker::new(5);
        tracker.record(key(), 0, 0.2);
        // Jump far beyond the window; only the new sample should remain, and
        // a single fresh sample cannot cover the whole window yet.
        let stable = tracker.record(key(), 10 * 60_000, 0.3);
        assert!(!stable);
    }
}
