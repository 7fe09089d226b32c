use poise::serenity_prelude as serenity;
use tracing::info;

use crate::{Context, Error};

/// Check that the bot is up and which marker it listens for
#[poise::command(prefix_command, slash_command)]
pub async fn ping(ctx: Context<'_>) -> Result<(), Error> {
    info!("Ping from {}", ctx.author().name);
    let config = ctx.data().router.config();
    let content = format!(
        "Pong! Listening for `{}` commands, verification {}.",
        config.command_marker,
        if config.verification_enabled { "on" } else { "off" }
    );
    ctx.send(poise::CreateReply::default().content(content).ephemeral(true))
        .await?;
    Ok(())
}

/// Show help information
#[poise::command(prefix_command, slash_command)]
pub async fn help(ctx: Context<'_>) -> Result<(), Error> {
    let config = ctx.data().router.config();
    let marker = config.command_marker;

    let mut embed = serenity::CreateEmbed::new()
        .title("Bot Commands")
        .description("Type these in any channel the bot can read:")
        .field(format!("{}apply", marker), "Get the link to apply for access", false)
        .field(format!("{}verify", marker), "Check whether your application was accepted", false)
        .field(format!("{}ss <url>", marker), "Check a link with Google Safe Browsing", false);

    if let Some(play) = &config.play_command {
        embed = embed.field(format!("{}{} <name>", marker, play), "Play a media clip on stream", false);
    }

    let chat_hint = if config.fallback_requires_marker {
        format!("Start a message with `{}` to ask the AI", marker)
    } else {
        "Any other message is answered by the AI".to_string()
    };

    embed = embed.field("Chat", chat_hint, false).color(0x3498db);

    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true)).await?;
    Ok(())
}
