use std::{future::Future, time::Duration};

use anyhow::{Context, Error, Result, anyhow, bail};
use chrono::{DateTime, Utc};
use reqwest::{
    Client, StatusCode, Url,
    header::{HeaderMap, HeaderValue, USER_AGENT},
};
use serde::Deserialize;
use tracing::debug;

pub const DEFAULT_BASE_API: &str = "https://query1.finance.yahoo.com";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Source of daily price history.
///
/// An empty `bars` vector means the provider knows nothing for the symbol;
/// transport or decoding problems are errors.
pub trait MarketData {
    fn fetch(
        &self,
        symbol: &str,
        period: Period,
    ) -> impl Future<Output = Result<PriceHistory>> + Send;
}

#[derive(Clone)]
pub struct PriceClient {
    client: Client,
    base_api: Url,
}

impl PriceClient {
    pub fn new(base_api: String) -> Result<Self> {
        Self::with_timeout(base_api, REQUEST_TIMEOUT)
    }

    /// `timeout` bounds a whole request, body included.
    pub fn with_timeout(base_api: String, timeout: Duration) -> Result<Self> {
        let base_api = Url::parse(&base_api)
            .with_context(|| format!("invalid market data base url: {base_api}"))?;
        ensure_path_base(&base_api)?;

        let mut headers = HeaderMap::new();
        // The chart endpoint rejects requests without a browser-like agent.
        headers.insert(USER_AGENT, HeaderValue::from_static("Mozilla/5.0"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(timeout)
            .build()?;

        Ok(Self { client, base_api })
    }

    /// `{base}/v8/finance/chart/{symbol}` with the symbol as one
    /// percent-encoded path segment.
    fn chart_url(&self, symbol: &str) -> Result<Url> {
        let mut url = self.base_api.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("base url cannot hold a path: {}", self.base_api))?
            .pop_if_empty()
            .extend(["v8", "finance", "chart", symbol]);
        Ok(url)
    }

    pub async fn fetch_price(&self, symbol: &str, period: Period) -> Result<PriceHistory, Error> {
        // dot segments would be dropped from the path
        if matches!(symbol, "" | "." | "..") {
            return Ok(PriceHistory::empty(symbol));
        }

        let url = self.chart_url(symbol)?;

        let res = self
            .client
            .get(url)
            .query(&[("range", period.as_str()), ("interval", "1d")])
            .send()
            .await?;

        let status = res.status();
        if status == StatusCode::NOT_FOUND {
            debug!(symbol, "provider has no such symbol");
            return Ok(PriceHistory::empty(symbol));
        }

        let body: ChartResponse = res
            .json()
            .await
            .with_context(|| format!("decoding chart response for {symbol} ({status})"))?;

        body.into_history(symbol)
    }
}

fn ensure_path_base(url: &Url) -> Result<()> {
    if url.cannot_be_a_base() {
        bail!("base url cannot hold a path: {url}");
    }
    Ok(())
}

impl MarketData for PriceClient {
    async fn fetch(&self, symbol: &str, period: Period) -> Result<PriceHistory> {
        self.fetch_price(symbol, period).await
    }
}

/// History range accepted by the chart endpoint. Bars are always daily.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Period {
    Day1,
    Day5,
    Month1,
    Month3,
    Month6,
    Year1,
    Year2,
    Year5,
    Max,
}

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Day1 => "1d",
            Period::Day5 => "5d",
            Period::Month1 => "1mo",
            Period::Month3 => "3mo",
            Period::Month6 => "6mo",
            Period::Year1 => "1y",
            Period::Year2 => "2y",
            Period::Year5 => "5y",
            Period::Max => "max",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IssuerInfo {
    pub long_name: Option<String>,
    pub short_name: Option<String>,
    pub currency: Option<String>,
    pub exchange_name: Option<String>,
    pub instrument_type: Option<String>,
}

impl IssuerInfo {
    pub fn display_name(&self) -> &str {
        self.long_name
            .as_deref()
            .or(self.short_name.as_deref())
            .unwrap_or("N/A")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriceHistory {
    pub symbol: String,
    pub bars: Vec<Bar>,
    pub issuer: IssuerInfo,
}

impl PriceHistory {
    pub fn empty(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            bars: Vec::new(),
            issuer: IssuerInfo::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}

//
// Match Yahoo chart JSON
// GET /v8/finance/chart/{symbol}?range=..&interval=1d
//
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    symbol: Option<String>,
    currency: Option<String>,
    exchange_name: Option<String>,
    instrument_type: Option<String>,
    long_name: Option<String>,
    short_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<Quote>,
}

#[derive(Debug, Deserialize, Default)]
struct Quote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

impl ChartResponse {
    fn into_history(self, requested: &str) -> Result<PriceHistory> {
        if let Some(err) = self.chart.error {
            bail!(
                "chart error for {}: {} {}",
                requested,
                err.code,
                err.description.unwrap_or_default()
            );
        }

        let Some(result) = self.chart.result.and_then(|r| r.into_iter().next()) else {
            return Ok(PriceHistory::empty(requested));
        };

        let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
        let mut bars = Vec::with_capacity(result.timestamp.len());

        for (i, &ts) in result.timestamp.iter().enumerate() {
            let (Some(open), Some(high), Some(low), Some(close)) = (
                value_at(&quote.open, i),
                value_at(&quote.high, i),
                value_at(&quote.low, i),
                value_at(&quote.close, i),
            ) else {
                continue;
            };
            let Some(timestamp) = DateTime::<Utc>::from_timestamp(ts, 0) else {
                continue;
            };

            bars.push(Bar {
                timestamp,
                open,
                high,
                low,
                close,
                volume: quote.volume.get(i).copied().flatten().unwrap_or(0),
            });
        }

        let meta = result.meta;
        Ok(PriceHistory {
            symbol: meta.symbol.unwrap_or_else(|| requested.to_string()),
            bars,
            issuer: IssuerInfo {
                long_name: meta.long_name,
                short_name: meta.short_name,
                currency: meta.currency,
                exchange_name: meta.exchange_name,
                instrument_type: meta.instrument_type,
            },
        })
    }
}

fn value_at(values: &[Option<f64>], i: usize) -> Option<f64> {
    values.get(i).copied().flatten()
}
