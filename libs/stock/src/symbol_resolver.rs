use tracing::{debug, warn};

use crate::price_client::{MarketData, Period};

/// Display names (lowercase) and their exchange tickers. Scanned in order.
pub const KOREAN_STOCKS: &[(&str, &str)] = &[
    ("삼성전자", "005930.KS"),
    ("sk하이닉스", "000660.KS"),
    ("네이버", "035420.KS"),
    ("카카오", "035720.KS"),
    ("lg화학", "051910.KS"),
    ("현대차", "005380.KS"),
    ("기아", "000270.KS"),
    ("포스코홀딩스", "005490.KS"),
    ("삼성바이오로직스", "207940.KS"),
    ("lg에너지솔루션", "373220.KS"),
    ("셀트리온", "068270.KS"),
    ("하이브", "352820.KS"),
    ("kb금융", "105560.KS"),
    ("신한지주", "055550.KS"),
];

const KOREAN_SUFFIXES: [&str; 2] = [".KS", ".KQ"];

/// Maps free text to a ticker.
///
/// Resolution order, first match wins:
/// 1. a table name contained in the lowercased query;
/// 2. a 2-5 letter ASCII word the provider returns 1-day data for;
/// 3. a word carrying a Korean exchange suffix, uppercased.
#[derive(Debug, Clone)]
pub struct SymbolResolver {
    table: &'static [(&'static str, &'static str)],
}

impl Default for SymbolResolver {
    fn default() -> Self {
        Self::new(KOREAN_STOCKS)
    }
}

impl SymbolResolver {
    pub fn new(table: &'static [(&'static str, &'static str)]) -> Self {
        Self { table }
    }

    pub fn lookup_name(&self, query: &str) -> Option<&'static str> {
        let query = query.to_lowercase();
        self.table
            .iter()
            .find(|(name, _)| query.contains(name))
            .map(|(_, ticker)| *ticker)
    }

    pub async fn resolve<P: MarketData>(&self, query: &str, provider: &P) -> Option<String> {
        if let Some(ticker) = self.lookup_name(query) {
            debug!(query, ticker, "resolved from name table");
            return Some(ticker.to_string());
        }

        for word in query.to_uppercase().split_whitespace() {
            if !looks_like_ticker(word) {
                continue;
            }

            match provider.fetch(word, Period::Day1).await {
                Ok(history) if !history.is_empty() => {
                    debug!(query, ticker = word, "resolved by probe fetch");
                    return Some(word.to_string());
                }
                Ok(_) => debug!(word, "probe returned no data"),
                Err(e) => warn!(word, error = ?e, "probe fetch failed"),
            }
        }

        let suffixed = query
            .split_whitespace()
            .map(str::to_uppercase)
            .find(|word| KOREAN_SUFFIXES.iter().any(|suffix| word.contains(suffix)));

        if suffixed.is_none() {
            debug!(query, "no symbol found");
        }
        suffixed
    }
}

fn looks_like_ticker(word: &str) -> bool {
    (2..=5).contains(&word.len()) && word.chars().all(|c| c.is_ascii_alphabetic())
}
