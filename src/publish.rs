// =============================================================================
// PublishPort — push the latest ranked snapshot to subscribers (spec §4.7)
// =============================================================================
//
// Built on `tokio::sync::watch`, the same "latest value, not a queue" channel
// the spec calls for: subscribers always see the most recent snapshot and
// never a backlog. Grounded on the teacher's broadcast usage in
// `api/ws.rs` (fan-out of book updates to connected clients), generalized
// from an unbounded broadcast channel to a watch channel since only the
// latest value — never history — matters here (spec §4.7, §5 "Publisher
// observes snapshots in the order the engine produces them; no skipped
// snapshot is retried").
// =============================================================================

use tokio::sync::watch;

use crate::types::Opportunity;

pub struct PublishPort {
    tx: watch::Sender<Vec<Opportunity>>,
}

impl PublishPort {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Vec::new());
        Self { tx }
    }

    /// Subscribe to snapshot updates. The returned receiver immediately
    /// yields the current value on first `.changed()`/`.borrow()`.
    pub fn subscribe(&self) -> watch::Receiver<Vec<Opportunity>> {
        self.tx.subscribe()
    }

    /// Pull the current snapshot without subscribing.
    pub fn get_latest(&self) -> Vec<Opportunity> {
        self.tx.borrow().clone()
    }

    /// Publish a new snapshot. The lock inside `watch::Sender` is held only
    /// for the pointer swap, never across computation (spec §4.7).
    pub fn publish(&self, opportunities: Vec<Opportunity>) {
        // `send` only errors when every receiver has been dropped, which is
        // a normal shutdown race, not a failure worth propagating.
        let _ = self.tx.send(opportunities);
    }
}

impl Default for PublishPort {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Opportunity;

    fn sample() -> Opportunity {
        Opportunity {
            canonical_symbol: "BTCUSDT".to_string(),
            buy_exchange: "A".to_string(),
            buy_venue_symbol: "BTCUSDT".to_string(),
            buy_price: 100.0,
            buy_fee_pct: 0.001,
            sell_exchange: "B".to_string(),
            sell_venue_symbol: "BTCUSDT".to_string(),
            sell_price: 101.0,
            sell_fee_pct: 0.001,
            gross_profit_usdt: 1.0,
            total_fees_usdt: 0.2,
            spread_usdt: 0.8,
            spread_pct: 1.0,
            timestamp_ms: 0,
            is_stable: false,
            group_key: "BTCUSDT".to_string(),
        }
    }

    #[test]
    fn get_latest_starts_empty() {
        let port = PublishPort::new();
        assert!(port.get_latest().is_empty());
    }

    #[test]
    fn publish_updates_get_latest() {
        let port = PublishPort::new();
        port.publish(vec![sample()]);
        assert_eq!(port.get_latest().len(), 1);
    }

    #[tokio::test]
    async fn subscriber_observes_published_snapshot() {
        let port = PublishPort::new();
        let mut rx = port.subscribe();
        port.publish(vec![sample()]);
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().len(), 1);
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let port = PublishPort::new();
        port.publish(vec![sample()]);
    }
}
