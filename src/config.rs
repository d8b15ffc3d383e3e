// =============================================================================
// Static startup configuration — TOML, every field serde-defaulted
// =============================================================================
//
// Loaded once at startup (spec §6). A missing or unparsable config file is a
// `ConfigurationError` — the only fatal error class in this system (§7).
// Every field carries a `#[serde(default = "...")]` so that adding a field
// later never breaks loading an older config file, the same convention the
// teacher applies throughout `runtime_config.rs`.
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

fn default_enabled() -> bool {
    true
}
fn default_poll_interval_ms() -> u64 {
    2000
}
fn default_taker_pct() -> f64 {
    0.001
}
fn default_maker_pct() -> f64 {
    0.001
}
fn default_evaluation_interval_ms() -> u64 {
    1000
}
fn default_trade_notional_usdt() -> f64 {
    100.0
}
fn default_min_spread_pct() -> f64 {
    0.0
}
fn default_quote_ttl_ms() -> i64 {
    15_000
}
fn default_intake_capacity() -> usize {
    10_000
}
fn default_batch_size() -> usize {
    100
}
fn default_window_minutes() -> u32 {
    5
}
fn default_min_price_threshold() -> f64 {
    1e-6
}
fn default_price_diff_suspicious() -> f64 {
    0.30
}
fn default_price_diff_threshold() -> f64 {
    1.0
}
fn default_price_diff_aggressive() -> f64 {
    2.0
}
fn default_ratio_suspicious() -> f64 {
    1.5
}
fn default_ratio_threshold() -> f64 {
    2.0
}
fn default_ratio_aggressive() -> f64 {
    3.0
}
fn default_exchanges() -> Vec<ExchangeConfig> {
    vec![
        ExchangeConfig {
            name: "binance".into(),
            enabled: true,
            poll_interval_ms: 2000,
            fee: FeeConfig::default(),
        },
        ExchangeConfig {
            name: "kraken".into(),
            enabled: true,
            poll_interval_ms: 3000,
            fee: FeeConfig::default(),
        },
        ExchangeConfig {
            name: "okx".into(),
            enabled: true,
            poll_interval_ms: 2000,
            fee: FeeConfig::default(),
        },
    ]
}
fn default_bind_addr() -> String {
    "0.0.0.0:8080".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeConfig {
    #[serde(default = "default_taker_pct")]
    pub taker_pct: f64,
    #[serde(default = "default_maker_pct")]
    pub maker_pct: f64,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            taker_pct: default_taker_pct(),
            maker_pct: default_maker_pct(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub fee: FeeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    #[serde(default = "default_evaluation_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_trade_notional_usdt")]
    pub trade_notional_usdt: f64,
    #[serde(default = "default_min_spread_pct")]
    pub min_spread_pct: f64,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_evaluation_interval_ms(),
            trade_notional_usdt: default_trade_notional_usdt(),
            min_spread_pct: default_min_spread_pct(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_quote_ttl_ms")]
    pub quote_ttl_ms: i64,
    #[serde(default = "default_intake_capacity")]
    pub intake_capacity: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            quote_ttl_ms: default_quote_ttl_ms(),
            intake_capacity: default_intake_capacity(),
            batch_size: default_batch_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StabilityConfig {
    #[serde(default = "default_window_minutes")]
    pub window_minutes: u32,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            window_minutes: default_window_minutes(),
        }
    }
}

/// Thresholds for the §4.6 identity filter. Field names mirror the spec
/// prose exactly so the mapping from config to algorithm stays obvious.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilteringConfig {
    #[serde(default = "default_min_price_threshold")]
    pub min_price_threshold: f64,
    #[serde(default = "default_price_diff_suspicious")]
    pub price_diff_suspicious: f64,
    #[serde(default = "default_price_diff_threshold")]
    pub price_diff_threshold: f64,
    #[serde(default = "default_price_diff_aggressive")]
    pub price_diff_aggressive: f64,
    #[serde(default = "default_ratio_suspicious")]
    pub ratio_suspicious: f64,
    #[serde(default = "default_ratio_threshold")]
    pub ratio_threshold: f64,
    #[serde(default = "default_ratio_aggressive")]
    pub ratio_aggressive: f64,
}

impl Default for FilteringConfig {
    fn default() -> Self {
        Self {
            min_price_threshold: default_min_price_threshold(),
            price_diff_suspicious: default_price_diff_suspicious(),
            price_diff_threshold: default_price_diff_threshold(),
            price_diff_aggressive: default_price_diff_aggressive(),
            ratio_suspicious: default_ratio_suspicious(),
            ratio_threshold: default_ratio_threshold(),
            ratio_aggressive: default_ratio_aggressive(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_exchanges")]
    pub exchanges: Vec<ExchangeConfig>,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub stability: StabilityConfig,
    #[serde(default)]
    pub filtering: FilteringConfig,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            exchanges: default_exchanges(),
            evaluation: EvaluationConfig::default(),
            store: StoreConfig::default(),
            stability: StabilityConfig::default(),
            filtering: FilteringConfig::default(),
            bind_addr: default_bind_addr(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// Returns an error (a `ConfigurationError`, fatal at the call site in
    /// `main`) if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config from {}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.exchanges.len(), 3);
        assert_eq!(cfg.evaluation.interval_ms, 1000);
        assert_eq!(cfg.evaluation.trade_notional_usdt, 100.0);
        assert_eq!(cfg.store.quote_ttl_ms, 15_000);
        assert_eq!(cfg.store.batch_size, 100);
        assert_eq!(cfg.stability.window_minutes, 5);
    }

    #[test]
    fn deserialise_empty_toml_uses_defaults() {
        let cfg: AppConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.exchanges.len(), 3);
        assert_eq!(cfg.store.intake_capacity, 10_000);
    }

    #[test]
    fn deserialise_partial_toml_fills_defaults() {
        let toml_str = r#"
            bind_addr = "127.0.0.1:9000"

            [evaluation]
            min_spread_pct = 0.05
        "#;
        let cfg: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.bind_addr, "127.0.0.1:9000");
        assert_eq!(cfg.evaluation.min_spread_pct, 0.05);
        assert_eq!(cfg.evaluation.interval_ms, 1000);
        assert_eq!(cfg.exchanges.len(), 3);
    }

    #[test]
    fn roundtrip_serialisation() {
        let cfg = AppConfig::default();
        let s = toml::to_string(&cfg).unwrap();
        let cfg2: AppConfig = toml::from_str(&s).unwrap();
        assert_eq!(cfg.exchanges.len(), cfg2.exchanges.len());
        assert_eq!(cfg.store.batch_size, cfg2.store.batch_size);
    }

    #[test]
    fn load_missing_file_errors() {
        let result = AppConfig::load("/nonexistent/path/config.toml");
        assert!(result.is_err());
    }
}
