// =============================================================================
// OKX public ticker adapter
// =============================================================================
//
// OKX's `/api/v5/market/tickers?instType=SPOT` returns every SPOT instrument
// in one call, same shape as Binance's all-symbols ticker — filtering down
// to `target_symbols` happens client-side after parsing, same as the
// Binance adapter.
// =============================================================================

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, instrument, warn};

use super::{parse_price, ExchangeAdapter};
use crate::errors::ArbError;
use crate::symbol_mapper::SymbolMapper;
use crate::types::{FeeSchedule, Quote};

const BASE_URL: &str = "https://www.okx.com";

pub struct OkxAdapter {
    client: reqwest::Client,
    fee: FeeSchedule,
    poll_interval: Duration,
}

impl OkxAdapter {
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
impl ExchangeAdapter for OkxAdapter {
    fn name(&self) -> &str {
        "okx"
    }

    fn fee_schedule(&self) -> FeeSchedule {
        self.fee
    }

    fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    #[instrument(skip(self, mapper, target_symbols), name = "okx::poll")]
    async fn poll(
        &self,
        mapper: &SymbolMapper,
        target_symbols: &[String],
    ) -> Result<Vec<Quote>, ArbError> {
        let url = format!("{BASE_URL}/api/v5/market/tickers?instType=SPOT");

        let resp = self.client.get(&url).send().await.map_err(|e| {
            ArbError::TransientVenue {
                exchange: "okx".to_string(),
                source: e.into(),
            }
        })?;

        if !resp.status().is_success() {
            return Err(ArbError::TransientVenue {
                exchange: "okx".to_string(),
                source: anyhow::anyhow!("HTTP {}", resp.status()),
            });
        }

        let body: serde_json::Value = resp.json().await.map_err(|e| ArbError::TransientVenue {
            exchange: "okx".to_string(),
            source: e.into(),
        })?;

        let code = body.get("code").and_then(|v| v.as_str()).unwrap_or("");
        if code != "0" {
            return Err(ArbError::TransientVenue {
                exchange: "okx".to_string(),
                source: anyhow::anyhow!("OKX error code {code}"),
            });
        }

        let rows = body
            .get("data")
            .and_then(|v| v.as_array())
            .ok_or_else(|| ArbError::MalformedVenueData {
                exchange: "okx".to_string(),
                detail: "missing data array".to_string(),
            })?;

        let now_ms = Utc::now().timestamp_millis();
        let mut quotes = Vec::new();

        for row in rows {
            let venue_symbol = match row.get("instId").and_then(|v| v.as_str()) {
                Some(s) => s,
                None => {
                    warn!("skipping ticker row with no instId field");
                    continue;
                }
            };

            let canonical = match mapper.register("okx", venue_symbol) {
                Some(c) => c,
                None => continue,
            };

            if !target_symbols.is_empty() && !target_symbols.contains(&canonical) {
                continue;
            }

            let bid = row.get("bidPx").map(parse_price).unwrap_or(0.0);
            let ask = row.get("askPx").map(parse_price).unwrap_or(0.0);
            let last = row.get("last").map(parse_price).unwrap_or(0.0);

            quotes.push(Quote {
                exchange: "okx".to_string(),
                venue_symbol: venue_symbol.to_string(),
                canonical_symbol: canonical,
                bid,
                ask,
                last,
                timestamp_ms: now_ms,
            });
        }

        debug!(count = quotes.len(), "okx poll complete");
        Ok(quotes)
    }
}
