use std::fmt::Write;

use crate::indicators::technical::{IndicatorPoint, IndicatorSeries, sma};
use crate::price_client::{Bar, IssuerInfo, PriceHistory};

/// Benchmarks shown by the index board, display name first.
pub const MAJOR_INDICES: &[(&str, &str)] = &[
    ("코스피", "^KS11"),
    ("코스닥", "^KQ11"),
    ("S&P 500", "^GSPC"),
    ("나스닥", "^IXIC"),
];

const NOT_AVAILABLE: &str = "N/A";

/// Latest-bar view of a price history and its indicators.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub symbol: String,
    pub issuer: IssuerInfo,
    pub price: f64,
    pub prev_close: f64,
    pub volume: u64,
    pub avg_volume20: Option<f64>,
    pub latest: IndicatorPoint,
}

impl Snapshot {
    /// `None` when the history has no bars.
    pub fn new(history: &PriceHistory, indicators: &IndicatorSeries) -> Option<Self> {
        let last = history.bars.last()?;
        let latest = indicators.latest()?.clone();

        // a single bar compares against itself
        let prev_close = history
            .bars
            .len()
            .checked_sub(2)
            .map(|i| history.bars[i].close)
            .unwrap_or(last.close);

        let volumes: Vec<f64> = history.bars.iter().map(|b| b.volume as f64).collect();
        let avg_volume20 = sma(&volumes, 20).last().copied().flatten();

        Some(Self {
            symbol: history.symbol.clone(),
            issuer: history.issuer.clone(),
            price: last.close,
            prev_close,
            volume: last.volume,
            avg_volume20,
            latest,
        })
    }

    pub fn change(&self) -> f64 {
        self.price - self.prev_close
    }

    pub fn change_pct(&self) -> Option<f64> {
        percent_change(self.prev_close, self.price)
    }

    /// Last volume over its 20-day average.
    pub fn volume_ratio(&self) -> Option<f64> {
        self.avg_volume20
            .filter(|avg| *avg > 0.0)
            .map(|avg| self.volume as f64 / avg)
    }

    /// Percentage the current price sits above (or below) `level`.
    pub fn deviation_from(&self, level: Option<f64>) -> Option<f64> {
        level.and_then(|l| percent_change(l, self.price))
    }

    /// Market context block handed to the chat model.
    pub fn context(&self) -> String {
        let p = &self.latest;
        let currency = self.issuer.currency.as_deref().unwrap_or("");
        let rsi = match p.rsi14 {
            Some(v) => format!("{v:.2} ({})", rsi_status(v)),
            None => NOT_AVAILABLE.to_string(),
        };
        let bands = match p.bollinger {
            Some(b) => format!("상단 {:.2} / 중단 {:.2} / 하단 {:.2}", b.upper, b.mid, b.lower),
            None => NOT_AVAILABLE.to_string(),
        };
        let avg_volume = self
            .avg_volume20
            .map(|v| group_thousands(v.round() as u64))
            .unwrap_or_else(|| NOT_AVAILABLE.to_string());

        let mut out = String::new();
        let _ = writeln!(out, "현재 분석 중인 종목: {}", self.symbol);
        let _ = writeln!(out, "현재가: {:.2} {}", self.price, currency);
        let _ = writeln!(
            out,
            "전일대비: {:+.2} ({})",
            self.change(),
            fmt_signed_pct(self.change_pct())
        );
        let _ = writeln!(
            out,
            "거래량: {} (20일 평균: {})",
            group_thousands(self.volume),
            avg_volume
        );
        let _ = writeln!(out, "RSI(14): {rsi}");
        let _ = writeln!(out);
        let _ = writeln!(out, "최근 주가 동향:");
        let _ = writeln!(out, "- 5일 이평: {}", fmt_value(p.ma5, 2));
        let _ = writeln!(out, "- 20일 이평: {}", fmt_value(p.ma20, 2));
        let _ = writeln!(out, "- 60일 이평: {}", fmt_value(p.ma60, 2));
        let _ = writeln!(out, "- 볼린저 밴드(20, 2σ): {bands}");
        let _ = writeln!(out);
        let _ = writeln!(out, "기업 정보:");
        let _ = writeln!(out, "- 회사명: {}", self.issuer.display_name());
        let _ = writeln!(
            out,
            "- 거래소: {}",
            self.issuer.exchange_name.as_deref().unwrap_or(NOT_AVAILABLE)
        );
        let _ = writeln!(
            out,
            "- 통화: {}",
            self.issuer.currency.as_deref().unwrap_or(NOT_AVAILABLE)
        );
        out
    }
}

/// Last close of an index and its move against the previous close.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexQuote {
    pub last: f64,
    pub change_pct: Option<f64>,
}

impl IndexQuote {
    /// With a single bar the session open stands in for the previous close.
    pub fn from_bars(bars: &[Bar]) -> Option<Self> {
        let last = bars.last()?;
        let reference = match bars.len() {
            1 => last.open,
            n => bars[n - 2].close,
        };

        Some(Self {
            last: last.close,
            change_pct: percent_change(reference, last.close),
        })
    }
}

pub fn rsi_status(rsi: f64) -> &'static str {
    if rsi > 70.0 {
        "과매수"
    } else if rsi < 30.0 {
        "과매도"
    } else {
        "보통"
    }
}

pub fn percent_change(from: f64, to: f64) -> Option<f64> {
    (from != 0.0).then(|| (to / from - 1.0) * 100.0)
}

pub fn fmt_value(value: Option<f64>, precision: usize) -> String {
    match value {
        Some(v) => format!("{v:.precision$}"),
        None => NOT_AVAILABLE.to_string(),
    }
}

pub fn fmt_signed_pct(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:+.2}%"),
        None => NOT_AVAILABLE.to_string(),
    }
}

pub fn group_thousands(value: u64) -> String {
    group_digits(&value.to_string())
}

/// Formats `value` with `precision` decimals and comma-grouped integer digits.
pub fn fmt_number(value: f64, precision: usize) -> String {
    let text = format!("{:.precision$}", value.abs());
    let (int, frac) = match text.split_once('.') {
        Some((int, frac)) => (int, Some(frac)),
        None => (text.as_str(), None),
    };

    let mut out = String::new();
    if value < 0.0 && text.chars().any(|c| c.is_ascii_digit() && c != '0') {
        out.push('-');
    }
    out.push_str(&group_digits(int));
    if let Some(frac) = frac {
        out.push('.');
        out.push_str(frac);
    }
    out
}

fn group_digits(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
