use std::collections::BTreeMap;
use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::format::number_literal;

/// Crypto symbols priced by the market collaborator.
pub const COIN_SYMBOLS: [&str; 4] = ["BTC", "ETH", "SOL", "DOGE"];

// Default TTL for exchange rates (1 hour)
pub const DEFAULT_CACHE_TTL_MS: i64 = 60 * 60 * 1000;

/// Read-only snapshot of exchange rates and coin prices, supplied by the host.
pub trait MarketData {
    fn base_currency(&self) -> &str;

    /// Every fiat code with a known rate, base included.
    fn currency_codes(&self) -> Vec<String>;

    /// Value of one unit of `code` in the base currency.
    fn currency_rate(&self, code: &str) -> Option<f64> {
        self.convert_to_base(1.0, code)
    }

    fn convert_from_base(&self, value: f64, code: &str) -> Option<f64>;

    fn convert_to_base(&self, value: f64, code: &str) -> Option<f64>;

    /// Price of one coin in the base currency.
    fn coin_price(&self, symbol: &str) -> Option<f64>;

    fn coin_amount_from_base(&self, value: f64, symbol: &str) -> Option<f64> {
        let price = self.coin_price(symbol)?;
        (price > 0.0).then(|| value / price)
    }

    /// Epoch ms of the last refresh, if any.
    fn last_updated(&self) -> Option<i64>;

    fn cache_ttl_ms(&self) -> i64 {
        DEFAULT_CACHE_TTL_MS
    }

    /// Rates are approximate when never refreshed or older than the TTL.
    fn is_stale(&self, now_ms: i64) -> bool {
        match self.last_updated() {
            Some(at) => now_ms - at > self.cache_ttl_ms(),
            None => true,
        }
    }
}

/// In-memory market snapshot. `rates` are units of each currency per one
/// unit of base; `coins` are prices in base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticMarketData {
    pub base_currency: String,
    pub rates: BTreeMap<String, f64>,
    #[serde(default)]
    pub coins: BTreeMap<String, f64>,
    #[serde(default)]
    pub last_updated: Option<i64>,
    #[serde(default = "default_ttl")]
    pub cache_ttl_ms: i64,
}

fn default_ttl() -> i64 {
    DEFAULT_CACHE_TTL_MS
}

impl StaticMarketData {
    pub fn new(base_currency: &str) -> Self {
        let mut rates = BTreeMap::new();
        rates.insert(base_currency.to_uppercase(), 1.0);
        Self {
            base_currency: base_currency.to_uppercase(),
            rates,
            coins: BTreeMap::new(),
            last_updated: None,
            cache_ttl_ms: DEFAULT_CACHE_TTL_MS,
        }
    }

    pub fn with_rate(mut self, code: &str, per_base: f64) -> Self {
        self.rates.insert(code.to_uppercase(), per_base);
        self
    }

    pub fn with_coin(mut self, symbol: &str, price_in_base: f64) -> Self {
        self.coins.insert(symbol.to_uppercase(), price_in_base);
        self
    }

    pub fn updated_at(mut self, epoch_ms: i64) -> Self {
        self.last_updated = Some(epoch_ms);
        self
    }

    // Fallback rates for when no provider is available
    pub fn fallback() -> Self {
        Self::new("USD")
            .with_rate("EUR", 0.85)
            .with_rate("GBP", 0.72)
            .with_rate("CAD", 1.25)
            .with_rate("JPY", 115.0)
            .with_rate("AUD", 1.35)
            .with_rate("CNY", 6.45)
            .with_rate("INR", 75.0)
            .with_rate("BRL", 5.0)
            .with_rate("CHF", 0.9)
            .with_coin("BTC", 60_000.0)
            .with_coin("ETH", 3_000.0)
            .with_coin("SOL", 150.0)
            .with_coin("DOGE", 0.2)
    }

    fn rate(&self, code: &str) -> Option<f64> {
        self.rates.get(&code.to_uppercase()).copied().filter(|r| *r > 0.0)
    }
}

impl MarketData for StaticMarketData {
    fn base_currency(&self) -> &str {
        &self.base_currency
    }

    fn currency_codes(&self) -> Vec<String> {
        let mut codes: BTreeSet<String> = self.rates.keys().cloned().collect();
        codes.insert(self.base_currency.clone());
        codes.into_iter().collect()
    }

    fn convert_from_base(&self, value: f64, code: &str) -> Option<f64> {
        Some(value * self.rate(code)?)
    }

    fn convert_to_base(&self, value: f64, code: &str) -> Option<f64> {
        Some(value / self.rate(code)?)
    }

    fn coin_price(&self, symbol: &str) -> Option<f64> {
        self.coins.get(&symbol.to_uppercase()).copied()
    }

    fn last_updated(&self) -> Option<i64> {
        self.last_updated
    }

    fn cache_ttl_ms(&self) -> i64 {
        self.cache_ttl_ms
    }
}

fn token_alternation(tokens: &[String]) -> String {
    tokens.iter().map(|t| regex::escape(t)).collect::<Vec<_>>().join("|")
}

/// `2USD` -> `2 * USD`, `BTC(3)` -> `BTC * (3)`.
pub fn ensure_explicit_multiplication(input: &str, tokens: &[String]) -> String {
    if tokens.is_empty() {
        return input.to_string();
    }
    let alternation = token_alternation(tokens);
    let (Ok(before), Ok(after)) = (
        Regex::new(&format!(r"(?i)(\d|\))\s*({})\b", alternation)),
        Regex::new(&format!(r"(?i)\b({})\s*(\d|\()", alternation)),
    ) else {
        return input.to_string();
    };
    let s = before.replace_all(input, "$1 * $2");
    after.replace_all(&s, "$1 * $2").into_owned()
}

/// Replace currency codes and coin symbols with their value in base
/// currency. Returns the rewritten text and the currencies that were used.
pub fn resolve_dynamic_tokens(input: &str, market: &dyn MarketData) -> (String, BTreeSet<String>) {
    let codes = market.currency_codes();
    let mut tokens: Vec<String> = codes.clone();
    tokens.extend(COIN_SYMBOLS.iter().map(|s| s.to_string()));
    // Longest first so that "DOGE" is never shadowed by a shorter code
    tokens.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

    let mut used = BTreeSet::new();
    let spaced = ensure_explicit_multiplication(input, &tokens);
    let Ok(token_re) = Regex::new(&format!(r"(?i)\b({})\b", token_alternation(&tokens))) else {
        return (spaced, used);
    };
    let resolved = token_re
        .replace_all(&spaced, |caps: &Captures<'_>| {
            let token = caps[1].to_uppercase();
            if codes.contains(&token) {
                if let Some(rate) = market.currency_rate(&token) {
                    used.insert(token);
                    return number_literal(rate);
                }
            }
            if COIN_SYMBOLS.contains(&token.as_str()) {
                if let Some(price) = market.coin_price(&token) {
                    used.insert(market.base_currency().to_string());
                    return number_literal(price);
                }
            }
            caps[0].to_string()
        })
        .into_owned();
    (resolved, used)
}

static THREE_LETTERS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z]{3}$").unwrap());

pub fn looks_like_currency_code(raw: &str) -> bool {
    THREE_LETTERS.is_match(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn market() -> StaticMarketData {
        StaticMarketData::new("USD").with_rate("EUR", 0.9).with_rate("BRL", 5.0).with_coin("BTC", 60_000.0)
    }

    #[test]
    fn test_rates_through_base() {
        let m = market();
        assert_eq!(m.convert_from_base(100.0, "EUR"), Some(90.0));
        assert!((m.currency_rate("BRL").unwrap() - 0.2).abs() < 1e-12);
        assert_eq!(m.currency_rate("XYZ"), None);
        assert_eq!(m.coin_amount_from_base(30_000.0, "BTC"), Some(0.5));
        assert_eq!(m.currency_codes(), vec!["BRL", "EUR", "USD"]);
    }

    #[test]
    fn test_staleness() {
        let fresh = market().updated_at(1_000);
        assert!(!fresh.is_stale(1_000 + DEFAULT_CACHE_TTL_MS));
        assert!(fresh.is_stale(1_001 + DEFAULT_CACHE_TTL_MS));
        assert!(market().is_stale(0));
    }

    #[test]
    fn test_explicit_multiplication() {
        let tokens = vec!["USD".to_string()];
        assert_eq!(ensure_explicit_multiplication("2USD", &tokens), "2 * USD");
        assert_eq!(ensure_explicit_multiplication("USD 100", &tokens), "USD * 100");
    }

    #[test]
    fn test_resolve_tokens() {
        let (text, used) = resolve_dynamic_tokens(" USD 100 + 50 usd", &market());
        assert_eq!(text, " 1 * 100 + 50 * 1");
        assert!(used.contains("USD"));

        let (btc, used) = resolve_dynamic_tokens("0.5 btc", &market());
        assert_eq!(btc, "0.5 * 60000");
        assert!(used.contains("USD"));
    }

    #[test]
    fn test_words_are_left_alone() {
        let (text, used) = resolve_dynamic_tokens("5 apples", &market());
        assert_eq!(text, "5 apples");
        assert!(used.is_empty());
    }
}
