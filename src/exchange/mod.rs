// =============================================================================
// ExchangeAdapter — one variant per venue (spec §4.2, §9 "Dynamic dispatch")
// =============================================================================
//
// Modeled as a fixed capability set behind an object-safe trait, the way the
// spec's design notes prescribe: each venue is a distinct type produced by a
// factory keyed by name, and the aggregator holds them behind `Arc<dyn
// ExchangeAdapter>`.
//
// `poll()` performs exactly one REST round trip and returns the quotes
// present on that poll. The adapter itself does not loop, back off, or
// retry — that timing/backoff policy belongs to the aggregator's per-adapter
// worker task (see `aggregator.rs` and DESIGN.md's "Open Question
// decisions" #3), which keeps adapters trivially unit-testable as
// pure poll-and-parse functions, mirroring how the teacher's
// `binance::client::BinanceClient` methods are single round trips with no
// retry loop of their own.
// =============================================================================

mod binance;
mod kraken;
mod okx;

pub use binance::BinanceAdapter;
pub use kraken::KrakenAdapter;
pub use okx::OkxAdapter;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::errors::ArbError;
use crate::symbol_mapper::SymbolMapper;
use crate::types::{FeeSchedule, Quote};

#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    /// Stable exchange identifier, e.g. `"binance"`.
    fn name(&self) -> &str;

    /// Taker/maker fee fractions for this venue.
    fn fee_schedule(&self) -> FeeSchedule;

    /// This venue's configured poll cadence.
    fn poll_interval(&self) -> Duration;

    /// Fetch the venue's public ticker endpoint once and return all
    /// `Quote`s present for symbols canonicalizing into `target_symbols`.
    ///
    /// Contract (spec §4.2): every returned quote has a positive
    /// `timestamp_ms` and a valid `canonical_symbol`; non-USDT quotes are
    /// filtered out before returning; malformed rows are skipped rather than
    /// failing the whole call. A transient failure (timeout, 5xx, rate
    /// limit) surfaces as `Err(ArbError::TransientVenue)`.
    async fn poll(
        &self,
        mapper: &SymbolMapper,
        target_symbols: &[String],
    ) -> Result<Vec<Quote>, ArbError>;
}

/// Build the configured set of adapters keyed by name (spec §9 "Dynamic
/// dispatch over adapters").
pub fn build_adapter(
    name: &str,
    fee: FeeSchedule,
    poll_interval: Duration,
) -> Option<Arc<dyn ExchangeAdapter>> {
    match name {
        "binance" => Some(Arc::new(BinanceAdapter::new(fee, poll_interval))),
        "kraken" => Some(Arc::new(KrakenAdapter::new(fee, poll_interval))),
        "okx" => Some(Arc::new(OkxAdapter::new(fee, poll_interval))),
        _ => None,
    }
}

/// Shared helper: parse a JSON value that may be a quoted number (Binance,
/// OKX) or a bare number, returning `0.0` (the spec's "absent" price) rather
/// than an error on anything unparseable — individual bad fields should not
/// fail an otherwise-good ticker row.
pub(crate) fn parse_price(val: &serde_json::Value) -> f64 {
    if let Some(s) = val.as_str() {
        s.parse::<f64>().unwrap_or(0.0)
    } else {
        val.as_f64().unwrap_or(0.0)
    }
}
