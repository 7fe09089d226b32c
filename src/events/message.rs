use poise::serenity_prelude as serenity;
use tracing::debug;

use crate::router::ChatEvent;
use crate::{Data, Error};

/// Map a Discord message onto the platform-neutral chat event
pub fn chat_event_from_message(msg: &serenity::Message, bot_id: serenity::UserId) -> ChatEvent {
    ChatEvent {
        channel_id: msg.channel_id.to_string(),
        username: msg.author.name.clone(),
        message: msg.content.clone(),
        is_self: msg.author.id == bot_id,
    }
}

/// Handle incoming messages
pub async fn handle_message(
    ctx: &serenity::Context,
    msg: &serenity::Message,
    data: &Data,
) -> Result<(), Error> {
    let bot_id = ctx.cache.current_user().id;

    // Other bots never reach the router
    if msg.author.bot && msg.author.id != bot_id {
        return Ok(());
    }

    if msg.content.trim().is_empty() {
        debug!("Ignoring empty message from {}", msg.author.name);
        return Ok(());
    }

    let event = chat_event_from_message(msg, bot_id);
    data.router.dispatch(&event, data.transport.as_ref()).await;

    Ok(())
}
