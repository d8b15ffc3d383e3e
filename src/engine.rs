// =============================================================================
// ArbitrageEngine — periodic evaluator (spec §4.6)
// =============================================================================
//
// Snapshot-then-compute-then-swap, mirroring the lock discipline already
// established in `store.rs`: the tick reads one `QuoteStore::snapshot()`,
// does all pairwise arithmetic and identity-filter grouping against that
// owned copy with no lock held, then swaps the ranked result into
// `latest` under a lock held only for the assignment (spec §4.7, §5).
// =============================================================================

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::config::{EvaluationConfig, FilteringConfig};
use crate::stability::StabilityTracker;
use crate::store::QuoteStore;
use crate::types::Opportunity;

pub struct ArbitrageEngine {
    store: Arc<QuoteStore>,
    stability: Arc<StabilityTracker>,
    evaluation: EvaluationConfig,
    filtering: FilteringConfig,
    quote_ttl_ms: i64,
    /// `exchange -> taker_pct`, fixed at construction from `AppConfig`.
    fee_pcts: HashMap<String, f64>,
    latest: RwLock<Vec<Opportunity>>,
}

impl ArbitrageEngine {
    pub fn new(
        store: Arc<QuoteStore>,
        stability: Arc<StabilityTracker>,
        evaluation: EvaluationConfig,
        filtering: FilteringConfig,
        quote_ttl_ms: i64,
        fee_pcts: HashMap<String, f64>,
    ) -> Self {
        Self {
            store,
            stability,
            evaluation,
            filtering,
            quote_ttl_ms,
            fee_pcts,
            latest: RwLock::new(Vec::new()),
        }
    }

    /// Current ranked opportunity list. Cloned out from under a brief read
    /// lock — never the same lock the tick holds while computing.
    pub fn latest(&self) -> Vec<Opportunity> {
        self.latest.read().clone()
    }

    /// Run one evaluation tick (spec §4.6 steps 1-7).
    pub fn tick(&self) {
        let now_ms = Utc::now().timestamp_millis();
        let snapshot = self.store.snapshot();

        // Step 2+3: drop stale quotes, invert to symbol -> [(exchange, quote)].
        let mut by_symbol: HashMap<String, Vec<(String, crate::types::Quote)>> = HashMap::new();
        for ((exchange, _canonical), quote) in snapshot {
            if quote.is_stale(now_ms, self.quote_ttl_ms) {
                continue;
            }
            by_symbol
                .entry(quote.canonical_symbol.clone())
                .or_default()
                .push((exchange, quote));
        }

        let mut raw = Vec::new();
        for (symbol, quotes) in &by_symbol {
            if quotes.len() < 2 {
                continue;
            }
            self.evaluate_symbol(symbol, quotes, now_ms, &mut raw);
        }

        // Step 5: identity filter, grouped per canonical symbol.
        let mut by_symbol_opps: HashMap<String, Vec<Opportunity>> = HashMap::new();
        for opp in raw {
            by_symbol_opps
                .entry(opp.canonical_symbol.clone())
                .or_default()
                .push(opp);
        }

        let mut final_opps = Vec::new();
        for (symbol, opps) in by_symbol_opps {
            final_opps.extend(self.apply_identity_filter(&symbol, opps));
        }

        // Step 6: stability, now that group_key assignment is final.
        for opp in &mut final_opps {
            let key = (
                opp.canonical_symbol.clone(),
                opp.buy_exchange.clone(),
                opp.sell_exchange.clone(),
            );
            opp.is_stable = self.stability.record(key, now_ms, opp.spread_pct);
        }

        // Step 7: rank and swap.
        final_opps.sort_by(|a, b| {
            b.spread_usdt
                .partial_cmp(&a.spread_usdt)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    b.spread_pct
                        .partial_cmp(&a.spread_pct)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| a.canonical_symbol.cmp(&b.canonical_symbol))
        });

        debug!(count = final_opps.len(), "tick produced opportunities");
        *self.latest.write() = final_opps;
    }

    /// Evaluate every ordered (buy, sell) pair for one canonical symbol,
    /// pushing any qualifying `Opportunity` onto `out`. A failure on one pair
    /// must not abort the rest of the tick (spec §4.6 "Failure semantics").
    fn evaluate_symbol(
        &self,
        symbol: &str,
        quotes: &[(String, crate::types::Quote)],
        now_ms: i64,
        out: &mut Vec<Opportunity>,
    ) {
        for (buy_exchange, buy_quote) in quotes {
            for (sell_exchange, sell_quote) in quotes {
                if buy_exchange == sell_exchange {
                    continue;
                }

                let Some(buy_price) = buy_quote.buy_price() else {
                    continue;
                };
                let Some(sell_price) = sell_quote.sell_price() else {
                    continue;
                };
                if buy_price <= 0.0 || sell_price <= 0.0 {
                    continue;
                }

                let notional = self.evaluation.trade_notional_usdt;
                let qty = notional / buy_price;
                if !qty.is_finite() {
                    warn!(symbol, buy_exchange, "skipping non-finite quantity");
                    continue;
                }

                let gross_profit = qty * (sell_price - buy_price);
                let buy_fee_pct = self.fee_pct(buy_exchange);
                let sell_fee_pct = self.fee_pct(sell_exchange);
                let buy_fee = qty * buy_price * buy_fee_pct;
                let sell_fee = qty * sell_price * sell_fee_pct;
                let total_fees = buy_fee + sell_fee;
                let net = gross_profit - total_fees;
                let spread_pct = (sell_price - buy_price) / buy_price * 100.0;

                if net <= 0.0 || spread_pct < self.evaluation.min_spread_pct {
                    continue;
                }

                out.push(Opportunity {
                    canonical_symbol: symbol.to_string(),
                    buy_exchange: buy_exchange.clone(),
                    buy_venue_symbol: buy_quote.venue_symbol.clone(),
                    buy_price,
                    buy_fee_pct,
                    sell_exchange: sell_exchange.clone(),
                    sell_venue_symbol: sell_quote.venue_symbol.clone(),
                    sell_price,
                    sell_fee_pct,
                    gross_profit_usdt: gross_profit,
                    total_fees_usdt: total_fees,
                    spread_usdt: net,
                    spread_pct,
                    timestamp_ms: now_ms,
                    is_stable: false,
                    group_key: symbol.to_string(),
                });
            }
        }
    }

    fn fee_pct(&self, exchange: &str) -> f64 {
        self.fee_pcts.get(exchange).copied().unwrap_or(0.001)
    }

    /// Split a canonical symbol's opportunity group when its underlying
    /// quotes look like distinct assets sharing a ticker (spec §4.6
    /// "Identity filter"). The `ratio > 100` / zero-alongside-normal branch
    /// applies regardless of group size; the "(with ≥ 2 opportunities)"
    /// qualifier in the spec attaches only to the price_diff/ratio-threshold
    /// branch.
    fn apply_identity_filter(&self, symbol: &str, opps: Vec<Opportunity>) -> Vec<Opportunity> {
        if opps.is_empty() {
            return opps;
        }

        // Gather every distinct price observed on either side of any
        // opportunity for this symbol — these stand in for the per-venue
        // quote prices the spec's grouping math operates on.
        let prices: Vec<f64> = opps
            .iter()
            .flat_map(|o| [o.buy_price, o.sell_price])
            .filter(|p| *p > self.filtering.min_price_threshold)
            .collect();

        if prices.is_empty() {
            return opps;
        }

        let avg = prices.iter().sum::<f64>() / prices.len() as f64;
        let min = prices.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = prices.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        let has_zero_alongside_normal = opps.iter().any(|o| {
            let low = o.buy_price.min(o.sell_price);
            let high = o.buy_price.max(o.sell_price);
            low <= self.filtering.min_price_threshold && high > self.filtering.min_price_threshold
        });

        let price_diff = if avg > 0.0 { (max - min) / avg } else { 0.0 };
        let price_ratio = if min > 0.0 { max / min } else { f64::INFINITY };

        // Past the aggressive threshold the divergence is severe enough that
        // the default 0.5/1.5 bands already separate the groups cleanly;
        // below it (the milder case) the narrower "aggressive" 0.7/1.3 bands
        // catch subtler splits the wide bands would blur into "normal".
        let (low_mult, high_mult) =
            if price_diff > self.filtering.price_diff_aggressive
                || price_ratio > self.filtering.ratio_aggressive
            {
                (0.5, 1.5)
            } else {
                (0.7, 1.3)
            };
        let band = |p: f64| -> &'static str {
            if p < low_mult * avg {
                "low"
            } else if p > high_mult * avg {
                "high"
            } else {
                "normal"
            }
        };

        if price_ratio > 100.0 || has_zero_alongside_normal {
            return opps
                .into_iter()
                .map(|mut o| {
                    let buy_band = band(o.buy_price);
                    let sell_band = band(o.sell_price);
                    o.group_key = format!(
                        "{symbol}#{}-{}#{buy_band}-{sell_band}",
                        o.buy_exchange, o.sell_exchange
                    );
                    o
                })
                .collect();
        }

        if opps.len() >= 2
            && (price_diff > self.filtering.price_diff_threshold
                || price_ratio > self.filtering.ratio_threshold)
        {
            return opps
                .into_iter()
                .map(|mut o| {
                    let base = venue_base(&o.buy_venue_symbol);
                    let buy_band = band(o.buy_price);
                    let sell_band = band(o.sell_price);
                    o.group_key = format!("{symbol}#{base}#{buy_band}-{sell_band}");
                    o
                })
                .collect();
        }

        let distinct_bases = opps
            .iter()
            .map(|o| venue_base(&o.buy_venue_symbol))
            .collect::<std::collections::HashSet<_>>()
            .len();

        if (price_diff > self.filtering.price_diff_suspicious
            || price_ratio > self.filtering.ratio_suspicious)
            && distinct_bases > 1
        {
            return opps
                .into_iter()
                .map(|mut o| {
                    let base = venue_base(&o.buy_venue_symbol);
                    o.group_key = format!("{symbol}#{base}");
                    o
                })
                .collect();
        }

        opps
    }
}

/// Strip a venue symbol down to its base asset, stripping any separator and
/// the trailing quote currency, used only to compare "same base asset"
/// across differently-spelled venue symbols within the identity filter.
fn venue_base(venue_symbol: &str) -> String {
    venue_symbol
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_uppercase()
        .trim_end_matches("USDT")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Quote;

    fn engine() -> ArbitrageEngine {
        let mut fee_pcts = HashMap::new();
        for ex in ["A", "B", "C"] {
            fee_pcts.insert(ex.to_string(), 0.001);
        }
        ArbitrageEngine::new(
            Arc::new(QuoteStore::new()),
            Arc::new(StabilityTracker::new(5)),
            EvaluationConfig {
                interval_ms: 1000,
                trade_notional_usdt: 100.0,
                min_spread_pct: 0.0,
            },
            FilteringConfig::default(),
            15_000,
            fee_pcts,
        )
    }

    fn quote(exchange: &str, bid: f64, ask: f64, ts: i64) -> Quote {
        Quote {
            exchange: exchange.to_string(),
            venue_symbol: "BTCUSDT".to_string(),
            canonical_symbol: "BTCUSDT".to_string(),
            bid,
            ask,
            last: 0.0,
            timestamp_ms: ts,
        }
    }

    #[test]
    fn happy_path_produces_expected_opportunity() {
        let engine = engine();
        let now = Utc::now().timestamp_millis();
        engine.store.upsert_batch(vec![
            ("A".to_string(), quote("A", 60000.0, 60010.0, now)),
            ("B".to_string(), quote("B", 60050.0, 60055.0, now)),
        ]);
        engine.tick();
        let opps = engine.latest();
        let best = opps
            .iter()
            .find(|o| o.buy_exchange == "A" && o.sell_exchange == "B")
            .expect("expected A->B opportunity");
        assert_eq!(best.buy_price, 60010.0);
        assert_eq!(best.sell_price, 60050.0);
        let qty = 100.0 / 60010.0;
        let expected_gross = qty * 40.0;
        assert!((best.gross_profit_usdt - expected_gross).abs() < 1e-6);
    }

    #[test]
    fn stale_quote_is_excluded() {
        let engine = engine();
        let now = Utc::now().timestamp_millis();
        engine.store.upsert_batch(vec![
            ("A".to_string(), quote("A", 60000.0, 60010.0, now - 20_000)),
            ("B".to_string(), quote("B", 60050.0, 60055.0, now)),
        ]);
        engine.tick();
        assert!(engine.latest().is_empty());
    }

    #[test]
    fn zero_price_never_used() {
        let engine = engine();
        let now = Utc::now().timestamp_millis();
        engine.store.upsert_batch(vec![
            ("A".to_string(), quote("A", 0.0, 0.0, now)),
            ("B".to_string(), quote("B", 60050.0, 60055.0, now)),
        ]);
        engine.tick();
        assert!(engine.latest().is_empty());
    }

    #[test]
    fn ranked_descending_by_spread_usdt() {
        let engine = engine();
        let now = Utc::now().timestamp_millis();
        engine.store.upsert_batch(vec![
            ("A".to_string(), quote("A", 100.0, 101.0, now)),
            ("B".to_string(), quote("B", 150.0, 151.0, now)),
            ("C".to_string(), quote("C", 200.0, 201.0, now)),
        ]);
        engine.tick();
        let opps = engine.latest();
        for pair in opps.windows(2) {
            assert!(pair[0].spread_usdt >= pair[1].spread_usdt);
        }
    }

    #[test]
    fn extreme_ratio_splits_into_distinct_group_keys() {
        let mut engine = engine();
        engine.filtering.min_price_threshold = 1e-6;
        let now = Utc::now().timestamp_millis();
        engine.store.upsert_batch(vec![
            (
                "A".to_string(),
                Quote {
                    exchange: "A".to_string(),
                    venue_symbol: "GAMEUSDT".to_string(),
                    canonical_symbol: "GAMEUSDT".to_string(),
                    bid: 0.009,
                    ask: 0.01,
                    last: 0.0,
                    timestamp_ms: now,
                },
            ),
            (
                "C".to_string(),
                Quote {
                    exchange: "C".to_string(),
                    venue_symbol: "GAMEUSDT".to_string(),
                    canonical_symbol: "GAMEUSDT".to_string(),
                    bid: 249.0,
                    ask: 250.0,
                    last: 0.0,
                    timestamp_ms: now,
                },
            ),
        ]);
        engine.tick();
        let opps = engine.latest();
        assert!(!opps.is_empty());
        for o in &opps {
            assert_ne!(o.group_key, o.canonical_symbol);
        }
    }
}
