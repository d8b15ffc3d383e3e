// =============================================================================
// Shared data types for the arbitrage scanner (spec §3)
// =============================================================================

use serde::{Deserialize, Serialize};

/// A single venue's latest bid/ask/last for one canonical symbol.
///
/// Immutable once constructed. `bid <= ask` when both are positive; any of
/// `bid`/`ask`/`last` may be `0.0`, meaning "absent" — callers must never use
/// a zero price for computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub exchange: String,
    pub venue_symbol: String,
    pub canonical_symbol: String,
    pub bid: f64,
    pub ask: f64,
    pub last: f64,
    pub timestamp_ms: i64,
}

impl Quote {
    /// `true` if this quote is older than `ttl_ms` as of `now_ms`.
    pub fn is_stale(&self, now_ms: i64, ttl_ms: i64) -> bool {
        now_ms.saturating_sub(self.timestamp_ms) > ttl_ms
    }

    /// Best available buy-side price: `ask`, falling back to `last` then
    /// `bid`. Returns `None` if all three are non-positive ("absent").
    pub fn buy_price(&self) -> Option<f64> {
        [self.ask, self.last, self.bid]
            .into_iter()
            .find(|p| *p > 0.0)
    }

    /// Best available sell-side price: `bid`, falling back to `last` then
    /// `ask`. Returns `None` if all three are non-positive ("absent").
    pub fn sell_price(&self) -> Option<f64> {
        [self.bid, self.last, self.ask]
            .into_iter()
            .find(|p| *p > 0.0)
    }
}

/// Per-exchange taker/maker fee fractions (e.g. `0.001` = 0.1%). The engine
/// uses `taker_pct` only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub taker_pct: f64,
    pub maker_pct: f64,
}

/// Mutable per-exchange health record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeStatus {
    pub name: String,
    pub connected: bool,
    pub last_update_ms: i64,
    /// Distinct canonical symbols with a non-stale quote (spec §3, §9).
    pub quote_count: usize,
    pub error_count: u64,
    pub last_error: Option<String>,
}

impl ExchangeStatus {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            connected: false,
            last_update_ms: 0,
            quote_count: 0,
            error_count: 0,
            last_error: None,
        }
    }
}

/// A buy-low/sell-high triangulation across two venues for one canonical
/// symbol, net of taker fees (spec §3, §4.6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub canonical_symbol: String,
    pub buy_exchange: String,
    pub buy_venue_symbol: String,
    pub buy_price: f64,
    pub buy_fee_pct: f64,
    pub sell_exchange: String,
    pub sell_venue_symbol: String,
    pub sell_price: f64,
    pub sell_fee_pct: f64,
    pub gross_profit_usdt: f64,
    pub total_fees_usdt: f64,
    /// Net spread in USDT for the configured notional trade size.
    pub spread_usdt: f64,
    pub spread_pct: f64,
    pub timestamp_ms: i64,
    pub is_stable: bool,
    /// Synthetic identity-filter group key (spec §4.6). Opportunities that
    /// look like the same canonical symbol but are split as distinct assets
    /// carry distinct keys here; otherwise this equals `canonical_symbol`.
    pub group_key: String,
}
