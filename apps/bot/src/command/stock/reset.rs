use tracing::info;

use super::session_key;
use crate::{Context, Error};

/// Forget the conversation with the bot in this channel
#[poise::command(slash_command)]
pub async fn reset(ctx: Context<'_>) -> Result<(), Error> {
    let key = session_key(&ctx);
    let existed = ctx.data().sessions.discard(&key).await;

    info!(channel_id = key.0, user_id = key.1, existed, "reset: invoked");

    let msg = if existed {
        "대화 기록을 초기화했습니다."
    } else {
        "초기화할 대화 기록이 없습니다."
    };
    ctx.say(msg).await?;

    Ok(())
}
