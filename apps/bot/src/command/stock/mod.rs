mod ask;
mod chart;
mod indices;
mod reset;

use crate::{Context, Error};
use ask::ask;
use chart::chart;
use indices::indices;
use reset::reset;

#[poise::command(
    slash_command,
    rename = "stock",
    subcommands("ask", "chart", "indices", "reset")
)]
pub async fn stock_command(_: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Chat sessions are per user within a channel.
fn session_key(ctx: &Context<'_>) -> crate::SessionKey {
    (ctx.channel_id().get(), ctx.author().id.get())
}
