use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::error::{BotError, Result};
use crate::router::{ChatEvent, Router};
use crate::services::twitch::{TwitchChatMessage, TwitchIrc, TwitchTransport};

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Map a Twitch chat line onto the platform-neutral chat event
pub fn chat_event_from_twitch(msg: &TwitchChatMessage, own_login: &str) -> ChatEvent {
    ChatEvent {
        channel_id: msg.channel.clone(),
        username: msg.display_name.clone().unwrap_or_else(|| msg.login.clone()),
        message: msg.text.clone(),
        is_self: msg.login.eq_ignore_ascii_case(own_login),
    }
}

/// Keep the Twitch connection up and feed its chat through the router.
///
/// Returns only when Twitch rejects the login.
pub async fn run_twitch(
    irc: TwitchIrc,
    transport: TwitchTransport,
    router: Arc<Router>,
) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<TwitchChatMessage>();
    let own_login = irc.username().to_string();
    let transport = Arc::new(transport);

    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if msg.text.trim().is_empty() {
                continue;
            }
            let event = chat_event_from_twitch(&msg, &own_login);
            let router = router.clone();
            let transport = transport.clone();
            // Same-user events are serialized by the router's user locks
            tokio::spawn(async move {
                router.dispatch(&event, transport.as_ref()).await;
            });
        }
        debug!("Twitch chat pump ended");
    });

    loop {
        match irc.run_connection(&tx).await {
            Ok(()) => warn!("Twitch connection closed"),
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                error!("Twitch login rejected: {}", e);
                return Err(BotError::Internal {
                    message: format!("Twitch login rejected for {}", irc.username()),
                });
            }
            Err(e) => warn!("Twitch connection failed: {}", e),
        }
        info!("Reconnecting to Twitch in {}s", RECONNECT_DELAY.as_secs());
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(login: &str, display_name: Option<&str>, text: &str) -> TwitchChatMessage {
        TwitchChatMessage {
            channel: "#streamer".to_string(),
            login: login.to_string(),
            display_name: display_name.map(str::to_string),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_own_messages_are_flagged_self() {
        let event = chat_event_from_twitch(&message("gatebot", Some("GateBot"), "hi"), "gatebot");
        assert!(event.is_self);
        assert_eq!(event.username, "GateBot");
        assert_eq!(event.channel_id, "#streamer");
    }

    #[test]
    fn test_viewer_messages_use_display_name() {
        let event = chat_event_from_twitch(&message("viewer", Some("Viewer"), "!apply"), "gatebot");
        assert!(!event.is_self);
        assert_eq!(event.username, "Viewer");
        assert_eq!(event.message, "!apply");

        let event = chat_event_from_twitch(&message("viewer", None, "hello"), "gatebot");
        assert_eq!(event.username, "viewer");
    }
}
