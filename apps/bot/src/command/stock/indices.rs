use poise::CreateReply;
use serenity::all::CreateEmbed;
use serenity::futures::future::join_all;
use stock::summary::{IndexQuote, MAJOR_INDICES, fmt_number, fmt_signed_pct};
use stock::{MarketData, Period};
use tracing::{debug, info, warn};

use crate::prompt::INDEX_LOADING;
use crate::{Context, Error};

/// Show KOSPI, KOSDAQ, S&P 500 and NASDAQ
#[poise::command(slash_command)]
pub async fn indices(ctx: Context<'_>) -> Result<(), Error> {
    ctx.defer().await?;

    let provider = ctx.data().price_client.as_ref();
    info!("indices: invoked");

    let quotes = join_all(MAJOR_INDICES.iter().map(|(name, symbol)| async move {
        match provider.fetch(symbol, Period::Day5).await {
            Ok(history) => {
                debug!(symbol, bars = history.bars.len(), "indices: fetched");
                (*name, IndexQuote::from_bars(&history.bars))
            }
            Err(e) => {
                warn!(symbol, error = ?e, "indices: fetch failed");
                (*name, None)
            }
        }
    }))
    .await;

    let mut embed = CreateEmbed::default().title("📊 주요 지수").color(0x2d2f45);
    for (name, quote) in quotes {
        let (label, value) = match quote {
            Some(q) => {
                let arrow = if q.change_pct.unwrap_or(0.0) >= 0.0 {
                    "↗️"
                } else {
                    "↘️"
                };
                (
                    format!("{arrow} {name}"),
                    format!("{}\n{}", fmt_number(q.last, 2), fmt_signed_pct(q.change_pct)),
                )
            }
            None => (name.to_string(), INDEX_LOADING.to_string()),
        };
        embed = embed.field(label, value, true);
    }

    ctx.send(CreateReply::default().embed(embed)).await?;
    Ok(())
}
