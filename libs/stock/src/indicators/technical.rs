use chrono::{DateTime, Utc};
use ta::Next;
use ta::indicators::{SimpleMovingAverage, StandardDeviation};

use crate::price_client::Bar;

pub const RSI_PERIOD: usize = 14;
pub const BOLLINGER_PERIOD: usize = 20;
pub const BOLLINGER_WIDTH: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bands {
    pub upper: f64,
    pub mid: f64,
    pub lower: f64,
}

/// Indicator values for one bar. `None` means the window is not full yet.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorPoint {
    pub timestamp: DateTime<Utc>,
    pub ma5: Option<f64>,
    pub ma20: Option<f64>,
    pub ma60: Option<f64>,
    pub rsi14: Option<f64>,
    pub bollinger: Option<Bands>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSeries {
    pub points: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn latest(&self) -> Option<&IndicatorPoint> {
        self.points.last()
    }
}

/// Computes the full indicator set for `bars`.
///
/// Returns `None` for an empty input.
pub fn calculate(bars: &[Bar]) -> Option<IndicatorSeries> {
    if bars.is_empty() {
        return None;
    }

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let ma5 = sma(&closes, 5);
    let ma20 = sma(&closes, 20);
    let ma60 = sma(&closes, 60);
    let rsi14 = rsi(&closes, RSI_PERIOD);
    let bands = bollinger(&closes, BOLLINGER_PERIOD, BOLLINGER_WIDTH);

    let points = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| IndicatorPoint {
            timestamp: bar.timestamp,
            ma5: ma5[i],
            ma20: ma20[i],
            ma60: ma60[i],
            rsi14: rsi14[i],
            bollinger: bands[i],
        })
        .collect();

    Some(IndicatorSeries { points })
}

/// Simple moving average; the first `window - 1` points are undefined.
pub fn sma(closes: &[f64], window: usize) -> Vec<Option<f64>> {
    let Ok(mut avg) = SimpleMovingAverage::new(window) else {
        return vec![None; closes.len()];
    };

    closes
        .iter()
        .enumerate()
        .map(|(i, &x)| {
            let value = avg.next(x);
            (i + 1 >= window).then_some(value)
        })
        .collect()
}

/// RSI over the last `period` close deltas, averaged arithmetically.
///
/// Point `i` needs `period` deltas, so indices below `period` are undefined.
/// A zero loss average gives 100.
pub fn rsi(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    if period == 0 || closes.len() <= period {
        return out;
    }

    let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let n = period as f64;

    // deltas[i - 1] is the change into close i
    for i in period..closes.len() {
        let window = &deltas[i - period..i];
        let gain = window.iter().filter(|d| **d > 0.0).sum::<f64>() / n;
        let loss = window.iter().filter(|d| **d < 0.0).map(|d| d.abs()).sum::<f64>() / n;

        let value = if loss == 0.0 {
            100.0
        } else {
            100.0 - 100.0 / (1.0 + gain / loss)
        };
        out[i] = Some(value);
    }

    out
}

/// Bollinger bands: `period` SMA plus/minus `width` population standard
/// deviations of the same window.
pub fn bollinger(closes: &[f64], period: usize, width: f64) -> Vec<Option<Bands>> {
    let (Ok(mut avg), Ok(mut sd)) = (
        SimpleMovingAverage::new(period),
        StandardDeviation::new(period),
    ) else {
        return vec![None; closes.len()];
    };

    closes
        .iter()
        .enumerate()
        .map(|(i, &x)| {
            let mid = avg.next(x);
            // rounding can push a flat window's variance just below zero
            let spread = width * sd.next(x).max(0.0);
            (i + 1 >= period).then_some(Bands {
                upper: mid + spread,
                mid,
                lower: mid - spread,
            })
        })
        .collect()
}
