//! Discord side of the transport

use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use std::sync::Arc;

use crate::collaborators::ChatTransport;
use crate::error::{BotError, Result};

/// Discord rejects messages longer than this
pub const MAX_MESSAGE_CHARS: usize = 2000;

pub struct DiscordTransport {
    http: Arc<serenity::Http>,
}

impl DiscordTransport {
    pub fn new(http: Arc<serenity::Http>) -> Self {
        Self { http }
    }
}

/// Cut a reply down to Discord's limit on a char boundary
pub fn truncate_message(text: &str) -> &str {
    match text.char_indices().nth(MAX_MESSAGE_CHARS) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[async_trait]
impl ChatTransport for DiscordTransport {
    async fn send(&self, channel_id: &str, text: &str) -> Result<()> {
        let transport_error = |message: String| BotError::Transport {
            channel: channel_id.to_string(),
            message,
        };

        let id: u64 = channel_id
            .parse()
            .map_err(|_| transport_error("not a Discord channel id".to_string()))?;

        serenity::ChannelId::new(id)
            .say(&self.http, truncate_message(text))
            .await
            .map_err(|e| transport_error(e.to_string()))?;

        Ok(())
    }
}
