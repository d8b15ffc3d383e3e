// =============================================================================
// SymbolMapper — canonical <-> venue symbol translation (spec §4.1)
// =============================================================================
//
// Canonical symbols are uppercase `BASEUSDT` with no separator. Venue forms
// vary per exchange (`BASE-USDT`, `BASE_USDT`, `BASE/USDT`, or bare). Built
// from static per-exchange separator rules plus an explicit overrides table,
// the way `CandleKey` in the teacher's `market_data/candle_buffer.rs` treats
// a composite key as a small, deliberately dumb lookup structure.
// =============================================================================

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;

/// Per-venue symbol spelling convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VenueConvention {
    /// `BASE-USDT`
    Hyphen,
    /// `BASE_USDT`
    Underscore,
    /// `BASE/USDT`
    Slash,
    /// `BASEUSDT`
    Bare,
}

impl VenueConvention {
    fn separator(self) -> Option<char> {
        match self {
            Self::Hyphen => Some('-'),
            Self::Underscore => Some('_'),
            Self::Slash => Some('/'),
            Self::Bare => None,
        }
    }
}

/// Bidirectional canonical <-> venue symbol translator, scoped to
/// USDT-quoted pairs only (spec §4.1).
pub struct SymbolMapper {
    conventions: HashMap<String, VenueConvention>,
    /// Explicit overrides: `(exchange, canonical) -> venue_symbol`. Checked
    /// before the convention-derived rule.
    overrides: HashMap<(String, String), String>,
    /// `(exchange, canonical) -> venue_symbol` built lazily as adapters
    /// register which symbols they actually trade, populated via
    /// [`SymbolMapper::register`]. This is what backs `intersection()`.
    /// Interior mutability: multiple adapter workers register concurrently
    /// against a single shared `Arc<SymbolMapper>`.
    known: RwLock<HashMap<(String, String), String>>,
}

impl SymbolMapper {
    pub fn new(conventions: HashMap<String, VenueConvention>) -> Self {
        Self {
            conventions,
            overrides: HashMap::new(),
            known: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_override(
        mut self,
        exchange: impl Into<String>,
        canonical: impl Into<String>,
        venue_symbol: impl Into<String>,
    ) -> Self {
        self.overrides
            .insert((exchange.into(), canonical.into()), venue_symbol.into());
        self
    }

    /// Register that `exchange` trades `venue_symbol`, making it discoverable
    /// via `canonical()`/`intersection()`. Adapters call this once per poll
    /// cycle for every symbol they see, or once at startup from a known
    /// instrument list.
    pub fn register(&self, exchange: &str, venue_symbol: &str) -> Option<String> {
        let canonical = self.to_canonical(exchange, venue_symbol)?;
        self.known
            .write()
            .insert((exchange.to_string(), canonical.clone()), venue_symbol.to_string());
        Some(canonical)
    }

    /// Derive the canonical form of `venue_symbol` from `exchange`'s
    /// convention, without requiring prior registration. USDT-quoted pairs
    /// only; anything else yields `None`.
    fn to_canonical(&self, exchange: &str, venue_symbol: &str) -> Option<String> {
        let convention = *self.conventions.get(exchange)?;
        let upper = venue_symbol.to_uppercase();
        let bare = match convention.separator() {
            Some(sep) => upper.replace(sep, ""),
            None => upper,
        };
        if bare.ends_with("USDT") && bare.len() > 4 {
            Some(bare)
        } else {
            None
        }
    }

    /// Map a venue symbol to its canonical form, consulting overrides first.
    pub fn canonical(&self, exchange: &str, venue_symbol: &str) -> Option<String> {
        for ((ex, canon), venue) in &self.overrides {
            if ex == exchange && venue == venue_symbol {
                return Some(canon.clone());
            }
        }
        self.to_canonical(exchange, venue_symbol)
    }

    /// Map a canonical symbol back to `exchange`'s venue-native spelling.
    pub fn venue(&self, exchange: &str, canonical_symbol: &str) -> Option<String> {
        if let Some(v) = self
            .overrides
            .get(&(exchange.to_string(), canonical_symbol.to_string()))
        {
            return Some(v.clone());
        }
        if let Some(v) = self
            .known
            .read()
            .get(&(exchange.to_string(), canonical_symbol.to_string()))
        {
            return Some(v.clone());
        }
        let convention = *self.conventions.get(exchange)?;
        if !canonical_symbol.ends_with("USDT") || canonical_symbol.len() <= 4 {
            return None;
        }
        let base = &canonical_symbol[..canonical_symbol.len() - 4];
        Some(match convention.separator() {
            Some(sep) => format!("{base}{sep}USDT"),
            None => format!("{base}USDT"),
        })
    }

    /// Canonical symbols tradable on at least 2 configured exchanges, from
    /// what has been [`register`](Self::register)ed so far.
    pub fn intersection(&self) -> HashSet<String> {
        let known = self.known.read();
        let mut counts: HashMap<&str, HashSet<&str>> = HashMap::new();
        for (exchange, canonical) in known.keys() {
            counts
                .entry(canonical.as_str())
                .or_default()
                .insert(exchange.as_str());
        }
        counts
            .into_iter()
            .filter(|(_, exchanges)| exchanges.len() >= 2)
            .map(|(canon, _)| canon.to_string())
            .collect()
    }

    /// Every canonical symbol registered on any exchange so far, regardless
    /// of how many. Used to seed the target-symbol universe: adapters like
    /// Kraken that require an explicit pair list can only ever register a
    /// symbol they were already told to poll, so gating the universe on
    /// `intersection()` alone would keep them permanently empty for any
    /// pair they don't already share with two other exchanges.
    pub fn all_known(&self) -> HashSet<String> {
        self.known
            .read()
            .keys()
            .map(|(_, canonical)| canonical.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapper() -> SymbolMapper {
        let mut conventions = HashMap::new();
        conventions.insert("binance".to_string(), VenueConvention::Bare);
        conventions.insert("kraken".to_string(), VenueConvention::Slash);
        conventions.insert("okx".to_string(), VenueConvention::Hyphen);
        SymbolMapper::new(conventions)
    }

    #[test]
    fn canonicalizes_each_convention() {
        let m = mapper();
        assert_eq!(
            m.canonical("binance", "BTCUSDT"),
            Some("BTCUSDT".to_string())
        );
        assert_eq!(
            m.canonical("kraken", "btc/usdt"),
            Some("BTCUSDT".to_string())
        );
        assert_eq!(
            m.canonical("okx", "BTC-USDT"),
            Some("BTCUSDT".to_string())
        );
    }

    #[test]
    fn non_usdt_pairs_rejected() {
        let m = mapper();
        assert_eq!(m.canonical("binance", "BTCBUSD"), None);
        assert_eq!(m.canonical("okx", "BTC-USD"), None);
    }

    #[test]
    fn roundtrip_venue_of_canonical() {
        let m = mapper();
        for (exchange, venue_symbol) in [
            ("binance", "BTCUSDT"),
            ("kraken", "BTC/USDT"),
            ("okx", "BTC-USDT"),
        ] {
            let canon = m.canonical(exchange, venue_symbol).unwrap();
            assert_eq!(m.venue(exchange, &canon), Some(venue_symbol.to_string()));
        }
    }

    #[test]
    fn overrides_take_precedence() {
        let m = mapper().with_override("okx", "ZKUSDT", "ZK-USDT-SPECIAL");
        assert_eq!(
            m.venue("okx", "ZKUSDT"),
            Some("ZK-USDT-SPECIAL".to_string())
        );
        assert_eq!(
            m.canonical("okx", "ZK-USDT-SPECIAL"),
            Some("ZKUSDT".to_string())
        );
    }

    #[test]
    fn intersection_requires_at_least_two_exchanges() {
        let m = mapper();
        m.register("binance", "BTCUSDT");
        m.register("kraken", "BTC/USDT");
        m.register("okx", "ETH-USDT");
        let set = m.intersection();
        assert!(set.contains("BTCUSDT"));
        assert!(!set.contains("ETHUSDT"));
    }
}
