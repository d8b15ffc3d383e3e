// =============================================================================
// Binance public ticker adapter
// =============================================================================
//
// Grounded on `binance/client.rs`'s reqwest-client construction and
// string-or-number JSON parsing conventions, stripped of everything signed
// (no API key, no HMAC) since this adapter only ever calls a public endpoint.
// =============================================================================

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, instrument, warn};

use super::{parse_price, ExchangeAdapter};
use crate::errors::ArbError;
use crate::symbol_mapper::SymbolMapper;
use crate::types::{FeeSchedule, Quote};

const BASE_URL: &str = "https://api.binance.com";

pub struct BinanceAdapter {
    client: reqwest::Client,
    fee: FeeSchedule,
    poll_interval: Duration,
}

impl BinanceAdapter {
    pub fn new(fee: FeeSchedule, poll_interval: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("failed to build reqwest client");
        Self {
            client,
            fee,
            poll_interval,
        }
    }
}

#[async_trait]
impl ExchangeAdapter for BinanceAdapter {
    fn name(&self) -> &str {
        "binance"
    }

    fn fee_schedule(&self) -> FeeSchedule {
        self.fee
    }

    fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    #[instrument(skip(self, mapper, target_symbols), name = "binance::poll")]
    async fn poll(
        &self,
        mapper: &SymbolMapper,
        target_symbols: &[String],
    ) -> Result<Vec<Quote>, ArbError> {
        let url = format!("{BASE_URL}/api/v3/ticker/24hr");

        let resp = self.client.get(&url).send().await.map_err(|e| {
            ArbError::TransientVenue {
                exchange: "binance".to_string(),
                source: e.into(),
            }
        })?;

        if !resp.status().is_success() {
            return Err(ArbError::TransientVenue {
                exchange: "binance".to_string(),
                source: anyhow::anyhow!("HTTP {}", resp.status()),
            });
        }

        let body: serde_json::Value = resp.json().await.map_err(|e| ArbError::TransientVenue {
            exchange: "binance".to_string(),
            source: e.into(),
        })?;

        let rows = body.as_array().ok_or_else(|| ArbError::MalformedVenueData {
            exchange: "binance".to_string(),
            detail: "ticker response is not an array".to_string(),
        })?;

        let now_ms = Utc::now().timestamp_millis();
        let mut quotes = Vec::new();

        for row in rows {
            let venue_symbol = match row.get("symbol").and_then(|v| v.as_str()) {
                Some(s) => s,
                None => {
                    warn!("skipping ticker row with no symbol field");
                    continue;
                }
            };

            let canonical = match mapper.register("binance", venue_symbol) {
                Some(c) => c,
                None => continue, // non-USDT or unmapped — silently skipped, not an error
            };

            if !target_symbols.is_empty() && !target_symbols.contains(&canonical) {
                continue;
            }

            let bid = row.get("bidPrice").map(parse_price).unwrap_or(0.0);
            let ask = row.get("askPrice").map(parse_price).unwrap_or(0.0);
            let last = row.get("lastPrice").map(parse_price).unwrap_or(0.0);

            quotes.push(Quote {
                exchange: "binance".to_string(),
                venue_symbol: venue_symbol.to_string(),
                canonical_symbol: canonical,
                bid,
                ask,
                last,
                timestamp_ms: now_ms,
            });
        }

        debug!(count = quotes.len(), "binance poll complete");
        Ok(quotes)
    }
}
