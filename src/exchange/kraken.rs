// =============================================================================
// Kraken public ticker adapter
// =============================================================================
//
// Kraken's public Ticker endpoint takes an explicit comma-separated `pair`
// list rather than returning every symbol unconditionally, so this adapter
// first resolves `target_symbols` to venue spellings via the shared
// `SymbolMapper`, then issues one request for the whole batch — still "one
// REST round trip per poll" per the adapter contract.
// =============================================================================

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, instrument, warn};

use super::{parse_price, ExchangeAdapter};
use crate::errors::ArbError;
use crate::symbol_mapper::SymbolMapper;
use crate::types::{FeeSchedule, Quote};

const BASE_URL: &str = "https://api.kraken.com";

pub struct KrakenAdapter {
    client: reqwest::Client,
    fee: FeeSchedule,
    poll_interval: Duration,
}

impl KrakenAdapter {
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
impl ExchangeAdapter for KrakenAdapter {
    fn name(&self) -> &str {
        "kraken"
    }

    fn fee_schedule(&self) -> FeeSchedule {
        self.fee
    }

    fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    #[instrument(skip(self, mapper, target_symbols), name = "kraken::poll")]
    async fn poll(
        &self,
        mapper: &SymbolMapper,
        target_symbols: &[String],
    ) -> Result<Vec<Quote>, ArbError> {
        if target_symbols.is_empty() {
            return Ok(Vec::new());
        }

        let pair_list: Vec<String> = target_symbols
            .iter()
            .filter_map(|canon| mapper.venue("kraken", canon))
            .collect();

        if pair_list.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!(
            "{BASE_URL}/0/public/Ticker?pair={}",
            pair_list.join(",")
        );

        let resp = self.client.get(&url).send().await.map_err(|e| {
            ArbError::TransientVenue {
                exchange: "kraken".to_string(),
                source: e.into(),
            }
        })?;

        if !resp.status().is_success() {
            return Err(ArbError::TransientVenue {
                exchange: "kraken".to_string(),
                source: anyhow::anyhow!("HTTP {}", resp.status()),
            });
        }

        let body: serde_json::Value = resp.json().await.map_err(|e| ArbError::TransientVenue {
            exchange: "kraken".to_string(),
            source: e.into(),
        })?;

        if let Some(errors) = body.get("error").and_then(|v| v.as_array()) {
            if !errors.is_empty() {
                return Err(ArbError::TransientVenue {
                    exchange: "kraken".to_string(),
                    source: anyhow::anyhow!("{:?}", errors),
                });
            }
        }

        let result = body
            .get("result")
            .and_then(|v| v.as_object())
            .ok_or_else(|| ArbError::MalformedVenueData {
                exchange: "kraken".to_string(),
                detail: "missing result object".to_string(),
            })?;

        let now_ms = Utc::now().timestamp_millis();
        let mut quotes = Vec::new();

        for (venue_symbol, entry) in result {
            let canonical = match mapper.register("kraken", venue_symbol) {
                Some(c) => c,
                None => continue,
            };

            let ask = entry
                .get("a")
                .and_then(|v| v.get(0))
                .map(parse_price)
                .unwrap_or(0.0);
            let bid = entry
                .get("b")
                .and_then(|v| v.get(0))
                .map(parse_price)
                .unwrap_or(0.0);
            let last = entry
                .get("c")
                .and_then(|v| v.get(0))
                .map(parse_price)
                .unwrap_or(0.0);

            if ask == 0.0 && bid == 0.0 && last == 0.0 {
                warn!(symbol = %venue_symbol, "skipping ticker row with no usable price fields");
                continue;
            }

            quotes.push(Quote {
                exchange: "kraken".to_string(),
                venue_symbol: venue_symbol.clone(),
                canonical_symbol: canonical,
                bid,
                ask,
                last,
                timestamp_ms: now_ms,
            });
        }

        debug!(count = quotes.len(), "kraken poll complete");
        Ok(quotes)
    }
}
