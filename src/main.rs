// =============================================================================
// Arbitrage Scanner — Main Entry Point
// =============================================================================
//
// Startup order follows the dependency order laid out in the system
// overview: SymbolMapper, then QuoteStore, StatusTracker, StabilityTracker,
// and PublishPort as the leaf singletons, then QuoteAggregator's workers,
// then ArbitrageEngine's tick loop, then the HTTP/WebSocket surface last.
// Shutdown runs in the reverse order, triggered by ctrl_c.
// =============================================================================

mod aggregator;
mod api;
mod config;
mod engine;
mod errors;
mod exchange;
mod publish;
mod stability;
mod status;
mod store;
mod symbol_mapper;
mod types;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::engine::ArbitrageEngine;
use crate::exchange::build_adapter;
use crate::publish::PublishPort;
use crate::stability::StabilityTracker;
use crate::status::StatusTracker;
use crate::store::QuoteStore;
use crate::symbol_mapper::{SymbolMapper, VenueConvention};

fn venue_convention(exchange: &str) -> Option<VenueConvention> {
    match exchange {
        "binance" => Some(VenueConvention::Bare),
        "kraken" => Some(VenueConvention::Slash),
        "okx" => Some(VenueConvention::Hyphen),
        _ => None,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("arbitrage scanner starting up");

    // A missing config file falls back to defaults (convenience for local
    // runs); a config file that exists but fails to parse is a
    // `ConfigurationError` — the only fatal error class (spec §7) — and
    // aborts the process rather than silently running on defaults.
    let config_path =
        std::env::var("ARB_CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    let config = if std::path::Path::new(&config_path).exists() {
        AppConfig::load(&config_path)
            .map_err(errors::ArbError::Configuration)
            .map_err(|e| {
                tracing::error!(error = %e, path = %config_path, "fatal: configuration error");
                e
            })?
    } else {
        info!(path = %config_path, "no config file found, using defaults");
        AppConfig::default()
    };

    // ── 1. Leaf singletons ────────────────────────────────────────────────
    let conventions: HashMap<String, VenueConvention> = config
        .exchanges
        .iter()
        .filter_map(|ex| venue_convention(&ex.name).map(|c| (ex.name.clone(), c)))
        .collect();
    let mapper = Arc::new(SymbolMapper::new(conventions));

    let store = Arc::new(QuoteStore::new());

    let enabled_names: Vec<String> = config
        .exchanges
        .iter()
        .filter(|ex| ex.enabled)
        .map(|ex| ex.name.clone())
        .collect();
    let status = Arc::new(StatusTracker::new(enabled_names.clone()));

    let stability = Arc::new(StabilityTracker::new(config.stability.window_minutes));
    let publish = Arc::new(PublishPort::new());

    // ── 2. Adapters ───────────────────────────────────────────────────────
    let mut adapters = Vec::new();
    let mut fee_pcts = HashMap::new();
    for ex in &config.exchanges {
        if !ex.enabled {
            continue;
        }
        let fee = crate::types::FeeSchedule {
            taker_pct: ex.fee.taker_pct,
            maker_pct: ex.fee.maker_pct,
        };
        fee_pcts.insert(ex.name.clone(), ex.fee.taker_pct);
        match build_adapter(
            &ex.name,
            fee,
            Duration::from_millis(ex.poll_interval_ms),
        ) {
            Some(adapter) => adapters.push(adapter),
            None => warn!(exchange = %ex.name, "no adapter implementation for configured exchange, skipping"),
        }
    }

    if adapters.is_empty() {
        anyhow::bail!("no exchange adapters configured — nothing to scan");
    }

    // ── 3. Aggregator: adapter workers + batch processor ─────────────────
    let aggregator = Arc::new(aggregator::QuoteAggregator::new(
        store.clone(),
        status.clone(),
        mapper.clone(),
        config.store.intake_capacity,
        config.store.batch_size,
        config.store.quote_ttl_ms,
        &adapters,
    ));

    let target_symbols = Arc::new(parking_lot::RwLock::new(Vec::new()));
    let shutdown = Arc::new(tokio::sync::Notify::new());

    let mut join_handles =
        aggregator.spawn(adapters, target_symbols.clone(), shutdown.clone());

    // Periodically widen the target-symbol universe to everything the
    // SymbolMapper has seen registered anywhere, not just the >= 2-exchange
    // intersection: Binance/OKX register every symbol unconditionally from
    // their "all symbols" endpoints, but Kraken can only register a symbol
    // it was already told to poll via this same list, so seeding it from
    // `intersection()` alone would make any kraken-plus-exactly-one-other-
    // exchange pair unreachable. `all_known()` breaks that cycle.
    {
        let mapper = mapper.clone();
        let target_symbols = target_symbols.clone();
        join_handles.push(tokio::spawn(async move {
            let mut tick = tokio::time::interval(Duration::from_secs(5));
            loop {
                tick.tick().await;
                let mut known: Vec<String> = mapper.all_known().into_iter().collect();
                known.sort();
                *target_symbols.write() = known;
            }
        }));
    }

    // ── 4. Evaluation engine ──────────────────────────────────────────────
    let engine = Arc::new(ArbitrageEngine::new(
        store.clone(),
        stability.clone(),
        config.evaluation.clone(),
        config.filtering.clone(),
        config.store.quote_ttl_ms,
        fee_pcts,
    ));

    {
        let engine = engine.clone();
        let publish = publish.clone();
        let interval_ms = config.evaluation.interval_ms;
        join_handles.push(tokio::spawn(async move {
            let mut tick = tokio::time::interval(Duration::from_millis(interval_ms));
            loop {
                tick.tick().await;
                engine.tick();
                publish.publish(engine.latest());
            }
        }));
    }

    // ── 5. HTTP/WebSocket surface ─────────────────────────────────────────
    let api_state = api::ApiState {
        publish: publish.clone(),
        status: status.clone(),
        filtering: config.filtering.clone(),
    };
    let bind_addr = config.bind_addr.clone();
    let server_handle = tokio::spawn(async move {
        let app = api::rest::router(api_state);
        let listener = tokio::net::TcpListener::bind(&bind_addr)
            .await
            .expect("failed to bind HTTP server");
        info!(addr = %bind_addr, "API server listening");
        if let Err(e) = axum::serve(listener, app).await {
            warn!(error = %e, "API server exited");
        }
    });

    info!("arbitrage scanner running — press ctrl-c to stop");
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    shutdown.notify_waiters();
    server_handle.abort();
    for handle in join_handles {
        handle.abort();
    }

    info!("shutdown complete");
    Ok(())
}
