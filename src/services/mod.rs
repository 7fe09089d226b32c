//! Concrete collaborators backed by real services

pub mod discord;
pub mod media;
pub mod openai;
pub mod safe_browsing;
pub mod sheets;
pub mod twitch;

pub use discord::DiscordTransport;
pub use media::ObsMediaTrigger;
pub use openai::OpenAiCompletion;
pub use safe_browsing::SafeBrowsingChecker;
pub use sheets::SheetsAllowList;
pub use twitch::{TwitchIrc, TwitchTransport};

use std::time::Duration;

use crate::error::{BotError, Result};

/// Upper bound for one outbound HTTP call; a user's later events wait on it
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(20);

/// HTTP client shared by the REST collaborators
pub fn http_client() -> Result<reqwest::Client> {
    reqwest::ClientBuilder::new()
        .timeout(HTTP_TIMEOUT)
        .connect_timeout(Duration::from_secs(5))
        .build()
        .map_err(|e| BotError::Internal {
            message: format!("Failed to build HTTP client: {}", e),
        })
}
