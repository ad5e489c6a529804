use std::time::Duration;

use assistant::{ChatTurn, PendingReply, ReplyStream};
use poise::{CreateReply, ReplyHandle};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::session_key;
use crate::analysis::{build_request, market_context};
use crate::message::{MESSAGE_LIMIT, preview_tail, split_message};
use crate::prompt::{EMPTY_REPLY, MISSING_API_KEY, THINKING, api_error_reply};
use crate::{Context, Error};

/// Minimum gap between progressive edits of the reply message.
const EDIT_INTERVAL: Duration = Duration::from_millis(800);

/// Ask the stock assistant; mentioned stocks are analysed with live data
#[poise::command(slash_command)]
pub async fn ask(
    ctx: Context<'_>,
    #[description = "Stock name or question (e.g. 삼성전자 어때, AAPL, 시장 전망은?)"]
    question: String,
) -> Result<(), Error> {
    ctx.defer().await?;

    let data = ctx.data();
    let key = session_key(&ctx);
    info!(channel_id = key.0, user_id = key.1, "ask: invoked");

    let Some(chat) = data.chat_client.clone() else {
        warn!("ask: no API key configured");
        ctx.say(MISSING_API_KEY).await?;
        return Ok(());
    };

    // held for the whole turn so turns of one session never interleave
    let session = data.sessions.get_or_create(&key).await;
    let mut session = session.lock().await;

    let context = market_context(data.price_client.as_ref(), &data.resolver, &question).await;
    let request = build_request(
        chat.request(),
        context.as_ref().map(|v| &v.snapshot),
        session.turns(),
        &question,
    );

    let handle = ctx.say(THINKING).await?;

    let turn = match chat.stream_chat(&request).await {
        Ok(mut stream) => relay(ctx, &handle, &mut stream).await,
        Err(e) => {
            warn!(error = ?e, "ask: chat request failed");
            ChatTurn::assistant(api_error_reply(&e))
        }
    };

    let text = if turn.text.is_empty() {
        EMPTY_REPLY.to_string()
    } else {
        turn.text.clone()
    };
    session.record_exchange(question.as_str(), turn);
    info!(turns = session.len(), "ask: turn recorded");

    deliver(ctx, &handle, &text).await
}

/// Appends fragments as they arrive, editing the placeholder message at most
/// once per [`EDIT_INTERVAL`]. The turn is only built once the stream ends.
#[instrument(skip_all)]
async fn relay(ctx: Context<'_>, handle: &ReplyHandle<'_>, stream: &mut ReplyStream) -> ChatTurn {
    let mut reply = PendingReply::new();
    let mut last_edit = Instant::now();

    while let Some(item) = stream.next().await {
        match item {
            Ok(fragment) => {
                reply.push(&fragment);

                if last_edit.elapsed() >= EDIT_INTERVAL {
                    let preview = preview_tail(reply.text(), MESSAGE_LIMIT);
                    if let Err(e) = handle.edit(ctx, CreateReply::default().content(preview)).await {
                        warn!(error = ?e, "progress edit failed");
                    }
                    last_edit = Instant::now();
                }
            }
            Err(e) => {
                warn!(error = ?e, fragments = reply.fragments(), "chat stream failed");
                return ChatTurn::assistant(api_error_reply(&e));
            }
        }
    }

    debug!(fragments = reply.fragments(), "chat stream complete");
    reply.finish()
}

/// Replaces the placeholder with the first chunk and sends the rest as
/// follow-up messages.
async fn deliver(ctx: Context<'_>, handle: &ReplyHandle<'_>, text: &str) -> Result<(), Error> {
    let mut chunks = split_message(text, MESSAGE_LIMIT).into_iter();

    if let Some(first) = chunks.next() {
        handle
            .edit(ctx, CreateReply::default().content(first))
            .await?;
    }
    for chunk in chunks {
        ctx.say(chunk).await?;
    }

    Ok(())
}
