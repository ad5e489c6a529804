use poise::CreateReply;
use serenity::all::{CreateAttachment, CreateEmbed};
use tracing::{debug, error, info, warn};

use crate::analysis::{ANALYSIS_PERIOD, load, metric_fields, render_chart};
use crate::prompt::SYMBOL_NOT_FOUND;
use crate::{Context, Error};

/// Candlestick chart with moving averages and key indicators
#[poise::command(slash_command)]
pub async fn chart(
    ctx: Context<'_>,
    #[description = "Stock name or symbol (e.g. 삼성전자, AAPL, 005930.KS)"] query: String,
) -> Result<(), Error> {
    info!(query, "chart: invoked");
    ctx.defer().await?;

    let data = ctx.data();
    let provider = data.price_client.as_ref();

    let symbol = match data.resolver.resolve(&query, provider).await {
        Some(s) => s,
        None => query.trim().to_uppercase(),
    };

    let view = match load(provider, &symbol, ANALYSIS_PERIOD).await {
        Ok(Some(v)) => {
            debug!(%symbol, bars = v.history.bars.len(), "chart: fetched");
            v
        }
        Ok(None) => {
            info!(%symbol, "chart: no price data");
            ctx.say(SYMBOL_NOT_FOUND).await?;
            return Ok(());
        }
        Err(e) => {
            warn!(%symbol, error = ?e, "chart: price fetch failed");
            ctx.say(SYMBOL_NOT_FOUND).await?;
            return Ok(());
        }
    };

    let image_bytes = match render_chart(&view).await {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(%symbol, error = ?e, "chart: render failed");
            return Err(e);
        }
    };

    let snapshot = &view.snapshot;
    let filename = format!("{}_chart.png", symbol.replace(['^', '.'], "_"));
    let attachment = CreateAttachment::bytes(image_bytes, filename.clone());

    let mut embed = CreateEmbed::default()
        .title(format!("{} 차트", symbol))
        .description(snapshot.issuer.display_name())
        .image(format!("attachment://{}", filename))
        .color(if snapshot.change() >= 0.0 {
            0x00ff00
        } else {
            0xff0000
        });
    for (name, value) in metric_fields(snapshot) {
        embed = embed.field(name, value, true);
    }

    ctx.send(CreateReply::default().embed(embed).attachment(attachment))
        .await?;
    info!(%symbol, "chart: sent");

    Ok(())
}
