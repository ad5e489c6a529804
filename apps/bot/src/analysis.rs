use anyhow::Result;
use assistant::{ChatRequest, ChatTurn, Role};
use stock::indicators::chart::generate_chart;
use stock::indicators::{IndicatorSeries, calculate};
use stock::summary::{Snapshot, fmt_number, fmt_signed_pct, fmt_value, rsi_status};
use stock::{MarketData, Period, PriceHistory, SymbolResolver};
use tracing::{debug, info, instrument, warn};

use crate::prompt::SYSTEM_PROMPT;

/// Price history of one symbol with its indicators and latest-bar snapshot.
#[derive(Debug, Clone)]
pub struct MarketView {
    pub history: PriceHistory,
    pub indicators: IndicatorSeries,
    pub snapshot: Snapshot,
}

/// Period used for chat context and charts.
pub const ANALYSIS_PERIOD: Period = Period::Month6;

/// Most recent transcript turns sent with a question.
pub const MAX_HISTORY_TURNS: usize = 20;

/// Fetches `symbol` and computes indicators. `Ok(None)` when the provider has
/// no bars for it.
#[instrument(skip(provider), fields(period = period.as_str()))]
pub async fn load<P: MarketData>(
    provider: &P,
    symbol: &str,
    period: Period,
) -> Result<Option<MarketView>> {
    let history = provider.fetch(symbol, period).await?;
    debug!(bars = history.bars.len(), "fetched price bars");

    let Some(indicators) = calculate(&history.bars) else {
        return Ok(None);
    };
    let Some(snapshot) = Snapshot::new(&history, &indicators) else {
        return Ok(None);
    };

    Ok(Some(MarketView {
        history,
        indicators,
        snapshot,
    }))
}

/// Resolves a symbol from free text and loads it. Every failure degrades to
/// `None` so the conversation continues without market context.
#[instrument(skip(provider, resolver))]
pub async fn market_context<P: MarketData>(
    provider: &P,
    resolver: &SymbolResolver,
    question: &str,
) -> Option<MarketView> {
    let symbol = resolver.resolve(question, provider).await?;
    info!(%symbol, "resolved symbol");

    match load(provider, &symbol, ANALYSIS_PERIOD).await {
        Ok(Some(view)) => Some(view),
        Ok(None) => {
            info!(%symbol, "no price data");
            None
        }
        Err(e) => {
            warn!(%symbol, error = ?e, "price fetch failed");
            None
        }
    }
}

/// System prompt, optional market context, the recent transcript, then the
/// pending question.
///
/// History is cut to the last [`MAX_HISTORY_TURNS`] turns and never starts
/// with an assistant turn.
pub fn build_request(
    base: ChatRequest,
    context: Option<&Snapshot>,
    history: &[ChatTurn],
    question: &str,
) -> ChatRequest {
    let mut recent = &history[history.len().saturating_sub(MAX_HISTORY_TURNS)..];
    while let Some((first, rest)) = recent.split_first()
        && first.role != Role::User
    {
        recent = rest;
    }

    let mut request = base.system(SYSTEM_PROMPT);
    if let Some(snapshot) = context {
        request = request.system(snapshot.context());
    }
    request.turns(recent).user(question)
}

/// Renders the chart PNG off the async runtime.
pub async fn render_chart(view: &MarketView) -> Result<Vec<u8>> {
    let symbol = view.history.symbol.clone();
    let bars = view.history.bars.clone();
    let indicators = view.indicators.clone();

    tokio::task::spawn_blocking(move || generate_chart(&symbol, &bars, &indicators)).await?
}

/// Embed rows for the chart command.
pub fn metric_fields(snapshot: &Snapshot) -> Vec<(&'static str, String)> {
    let p = &snapshot.latest;

    let rsi = match p.rsi14 {
        Some(v) => format!("{v:.1} ({})", rsi_status(v)),
        None => "N/A".to_string(),
    };
    let volume = match snapshot.volume_ratio() {
        Some(r) => format!("{r:.2}x"),
        None => "N/A".to_string(),
    };
    let averages = [("5일선", p.ma5), ("20일선", p.ma20), ("60일선", p.ma60)]
        .into_iter()
        .map(|(label, ma)| {
            format!(
                "{label}: {} ({})",
                fmt_value(ma, 2),
                fmt_signed_pct(snapshot.deviation_from(ma))
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    let bands = match p.bollinger {
        Some(b) => format!(
            "상단 {}\n중단 {}\n하단 {}",
            fmt_number(b.upper, 2),
            fmt_number(b.mid, 2),
            fmt_number(b.lower, 2)
        ),
        None => "N/A".to_string(),
    };

    vec![
        (
            "현재가",
            format!(
                "{} ({})",
                fmt_number(snapshot.price, 2),
                fmt_signed_pct(snapshot.change_pct())
            ),
        ),
        ("RSI (14일)", rsi),
        ("거래량 비율", volume),
        ("이동평균 (현재가 대비)", averages),
        ("볼린저 밴드 (20, 2σ)", bands),
    ]
}
