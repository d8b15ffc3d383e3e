//! Error taxonomy for the arbitrage scanner (spec §7).
//!
//! Every variant here maps to exactly one handling policy at its call site:
//! counted-and-continue for everything except [`ArbError::Configuration`],
//! which is the only fatal class.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArbError {
    /// HTTP 429/5xx, timeout, TLS, DNS. Counted, logged, adapter backs off
    /// and restarts. Never propagated past the adapter worker.
    #[error("transient error polling {exchange}: {source}")]
    TransientVenue {
        exchange: String,
        #[source]
        source: anyhow::Error,
    },

    /// A single ticker row failed to parse. The row is dropped, a counter is
    /// incremented, polling continues.
    #[error("malformed ticker data from {exchange}: {detail}")]
    MalformedVenueData { exchange: String, detail: String },

    /// A venue symbol has no canonical mapping. The quote is dropped
    /// silently, counted per-exchange.
    #[error("no canonical mapping for {exchange}:{venue_symbol}")]
    SymbolMapFailure {
        exchange: String,
        venue_symbol: String,
    },

    /// The intake channel was full; the quote was dropped rather than
    /// blocking the adapter.
    #[error("intake channel full for {exchange}, quote dropped")]
    StoreBackpressure { exchange: String },

    /// An arithmetic anomaly while evaluating one symbol. That symbol is
    /// skipped; the tick continues.
    #[error("evaluation error for {symbol}: {detail}")]
    Evaluation { symbol: String, detail: String },

    /// Bad startup configuration. The only fatal class — aborts the
    /// process.
    #[error("configuration error: {0}")]
    Configuration(#[from] anyhow::Error),
}
