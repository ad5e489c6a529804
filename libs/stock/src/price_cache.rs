use std::{collections::HashMap, time::Duration};

use anyhow::Result;
use tokio::{sync::Mutex, time::Instant};
use tracing::debug;

use crate::price_client::{MarketData, Period, PriceHistory};

pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

struct Entry {
    history: PriceHistory,
    fetched_at: Instant,
}

/// Time-to-live cache in front of a [`MarketData`] provider.
///
/// Entries are keyed by `(symbol, period)` and expire `ttl` after they were
/// fetched, regardless of how often they are read. Expiry is checked on read;
/// every insert also drops all expired entries. Failed fetches are never
/// stored.
pub struct PriceCache<P> {
    inner: P,
    ttl: Duration,
    entries: Mutex<HashMap<(String, Period), Entry>>,
}

impl<P> PriceCache<P> {
    pub fn new(inner: P, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn normalize(symbol: &str) -> String {
        symbol.trim().to_uppercase()
    }

    async fn lookup(&self, key: &(String, Period)) -> Option<PriceHistory> {
        let entries = self.entries.lock().await;
        entries
            .get(key)
            .filter(|e| e.fetched_at.elapsed() < self.ttl)
            .map(|e| e.history.clone())
    }

    /// Number of stored entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl<P> MarketData for PriceCache<P>
where
    P: MarketData + Send + Sync,
{
    async fn fetch(&self, symbol: &str, period: Period) -> Result<PriceHistory> {
        let key = (Self::normalize(symbol), period);

        if let Some(history) = self.lookup(&key).await {
            debug!(symbol = %key.0, period = period.as_str(), "price cache hit");
            return Ok(history);
        }

        debug!(symbol = %key.0, period = period.as_str(), "price cache miss");
        let history = self.inner.fetch(&key.0, period).await?;

        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, e| e.fetched_at.elapsed() < self.ttl);
        if entries.len() < before {
            debug!(evicted = before - entries.len(), "price cache swept");
        }
        entries.insert(
            key,
            Entry {
                history: history.clone(),
                fetched_at: Instant::now(),
            },
        );

        Ok(history)
    }
}
