use anyhow::{Error, ensure};
use charming::{
    Chart, ImageFormat, ImageRenderer,
    component::{Axis, Legend, Title},
    element::{AxisLabel, AxisType, LineStyle, SplitLine, Symbol, TextStyle},
    series::{Candlestick, Line},
};

use super::technical::IndicatorSeries;
use crate::price_client::Bar;

const LOOKBACK: usize = 120;
const WIDTH: u32 = 1200;
const HEIGHT: u32 = 600;

const MA_STYLES: [(&str, &str); 3] = [
    ("MA5", "#0064FF"),
    ("MA20", "#FF4D4F"),
    ("MA60", "#00D084"),
];

/// Builds a candlestick chart of the last bars with MA5/MA20/MA60 overlays.
pub fn build_chart(
    symbol: &str,
    bars: &[Bar],
    indicators: &IndicatorSeries,
) -> Result<Chart, Error> {
    ensure!(!bars.is_empty(), "bars is empty");
    ensure!(
        bars.len() == indicators.len(),
        "length mismatch: bars={}, indicators={}",
        bars.len(),
        indicators.len()
    );

    let start_idx = bars.len().saturating_sub(LOOKBACK);
    let bars = &bars[start_idx..];
    let points = &indicators.points[start_idx..];

    let dates: Vec<String> = bars
        .iter()
        .map(|b| b.timestamp.format("%Y-%m-%d").to_string())
        .collect();

    // echarts candlestick order: open, close, low, high
    let candles: Vec<Vec<f64>> = bars
        .iter()
        .map(|b| vec![b.open, b.close, b.low, b.high])
        .collect();

    let overlays: [Vec<f64>; 3] = [
        points.iter().map(|p| p.ma5.unwrap_or(f64::NAN)).collect(),
        points.iter().map(|p| p.ma20.unwrap_or(f64::NAN)).collect(),
        points.iter().map(|p| p.ma60.unwrap_or(f64::NAN)).collect(),
    ];

    let last_price = bars.last().map(|b| b.close).unwrap_or_default();

    let mut chart = Chart::new()
        .background_color("#0b0c17")
        .title(
            Title::new()
                .text(format!("{} | {:.2}", symbol.to_uppercase(), last_price))
                .left("center")
                .top("2%")
                .text_style(TextStyle::new().color("#ffffff").font_size(14)),
        )
        .legend(Legend::new().top("7%"))
        .x_axis(
            Axis::new()
                .type_(AxisType::Category)
                .data(dates)
                .axis_label(AxisLabel::new().rotate(45).interval(9).color("#a0a0a0"))
                .split_line(SplitLine::new().line_style(LineStyle::new().color("#2d2f45"))),
        )
        .y_axis(
            Axis::new()
                .type_(AxisType::Value)
                .scale(true)
                .axis_label(AxisLabel::new().color("#a0a0a0"))
                .split_line(SplitLine::new().line_style(LineStyle::new().color("#2d2f45"))),
        )
        .series(Candlestick::new().name("Price").data(candles));

    for ((name, color), values) in MA_STYLES.into_iter().zip(overlays) {
        chart = chart.series(
            Line::new()
                .name(name)
                .data(values)
                .symbol(Symbol::None)
                .line_style(LineStyle::new().width(1).color(color)),
        );
    }

    Ok(chart)
}

pub fn generate_chart(
    symbol: &str,
    bars: &[Bar],
    indicators: &IndicatorSeries,
) -> Result<Vec<u8>, Error> {
    let chart = build_chart(symbol, bars, indicators)?;

    let mut renderer = ImageRenderer::new(WIDTH, HEIGHT);
    let png_bytes = renderer.render_format(ImageFormat::Png, &chart)?;
    Ok(png_bytes)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::indicators::technical::calculate;

    fn bars(n: usize) -> Vec<Bar> {
        let start = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        (0..n)
            .map(|i| {
                let close = 100.0 + i as f64;
                Bar {
                    timestamp: start + Duration::days(i as i64),
                    open: close - 0.5,
                    high: close + 1.0,
                    low: close - 1.0,
                    close,
                    volume: 10,
                }
            })
            .collect()
    }

    #[test]
    fn rejects_empty_bars() {
        let series = IndicatorSeries { points: Vec::new() };
        let err = build_chart("AAPL", &[], &series).err().unwrap();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn rejects_misaligned_indicators() {
        let input = bars(30);
        let series = calculate(&input[..10]).unwrap();
        assert!(build_chart("AAPL", &input, &series).is_err());
    }

    #[test]
    fn builds_for_long_history() {
        let input = bars(200);
        let series = calculate(&input).unwrap();
        assert!(build_chart("005930.KS", &input, &series).is_ok());
    }
}
