use std::path::PathBuf;

use super::{env_lookup, optional, required, u64_or, Lookup};
use crate::error::{BotError, Result};

/// Discord connection settings
#[derive(Debug, Clone)]
pub struct DiscordConfig {
    pub token: String,
}

impl DiscordConfig {
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(&env_lookup)
    }

    /// `None` when no bot token is set
    pub fn from_lookup(lookup: Lookup<'_>) -> Option<Self> {
        optional(lookup, "DISCORD_TOKEN")
            .or_else(|| optional(lookup, "DISCORD_BOT_TOKEN"))
            .map(|token| Self { token })
    }
}

/// Twitch chat login and the channels to join
#[derive(Debug, Clone)]
pub struct TwitchConfig {
    /// Lowercase login name of the bot account
    pub username: String,
    /// Chat token including the `oauth:` prefix
    pub oauth_token: String,
    /// Channel names with a leading `#`, lowercase
    pub channels: Vec<String>,
}

impl TwitchConfig {
    pub fn from_env() -> Result<Option<Self>> {
        Self::from_lookup(&env_lookup)
    }

    /// `Ok(None)` when Twitch is not configured at all
    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Option<Self>> {
        let Some(username) = optional(lookup, "TWITCH_USER") else {
            return Ok(None);
        };

        let token = required(lookup, "TWITCH_AUTH")?;
        let oauth_token = if token.starts_with("oauth:") {
            token
        } else {
            format!("oauth:{}", token)
        };

        let channels: Vec<String> = required(lookup, "CHANNELS")?
            .split(',')
            .map(|c| c.trim().trim_start_matches('#').to_lowercase())
            .filter(|c| !c.is_empty())
            .map(|c| format!("#{}", c))
            .collect();
        if channels.is_empty() {
            return Err(BotError::ConfigInvalid {
                key: "CHANNELS".to_string(),
                value: String::new(),
                message: "expected a comma separated list of channels".to_string(),
            });
        }

        Ok(Some(Self {
            username: username.to_lowercase(),
            oauth_token,
            channels,
        }))
    }
}

/// OpenAI chat completion settings
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    /// File whose contents become the system prompt
    pub context_path: PathBuf,
}

impl OpenAiConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(&env_lookup)
    }

    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self> {
        let max_tokens = u64_or(lookup, "MAX_TOKENS", 100)?;
        let max_tokens = u32::try_from(max_tokens).map_err(|_| BotError::ConfigInvalid {
            key: "MAX_TOKENS".to_string(),
            value: max_tokens.to_string(),
            message: "too large".to_string(),
        })?;

        Ok(Self {
            api_key: required(lookup, "OPENAI_API_KEY")?,
            base_url: optional(lookup, "OPENAI_BASE_URL")
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string())
                .trim_end_matches('/')
                .to_string(),
            model: optional(lookup, "MODEL_NAME").unwrap_or_else(|| "gpt-4".to_string()),
            max_tokens,
            context_path: optional(lookup, "FILE_CONTEXT_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("file_context.txt")),
        })
    }
}

/// Google Safe Browsing settings
#[derive(Debug, Clone)]
pub struct SafeBrowsingConfig {
    pub api_key: String,
    pub client_id: String,
}

impl SafeBrowsingConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(&env_lookup)
    }

    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self> {
        Ok(Self {
            api_key: required(lookup, "GOOGLE_SAFE_BROWSING_API_KEY")?,
            client_id: optional(lookup, "SAFE_BROWSING_CLIENT_ID")
                .unwrap_or_else(|| "chatgate".to_string()),
        })
    }
}

/// Google Sheets allow list settings
#[derive(Debug, Clone)]
pub struct SheetsConfig {
    pub api_key: String,
    pub spreadsheet_id: String,
    /// A1 range holding the usernames, e.g. `C:C`
    pub range: String,
}

impl SheetsConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(&env_lookup)
    }

    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self> {
        Ok(Self {
            api_key: required(lookup, "GOOGLE_API_KEY")?,
            spreadsheet_id: required(lookup, "GOOGLE_SHEET_ID")?,
            range: optional(lookup, "GOOGLE_SHEET_RANGE").unwrap_or_else(|| "C:C".to_string()),
        })
    }
}

/// OBS media playback settings
#[derive(Debug, Clone)]
pub struct ObsConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    /// Media source whose file gets swapped and restarted
    pub media_source: String,
    /// Directory the playable assets live in
    pub media_dir: PathBuf,
}

impl ObsConfig {
    pub fn from_env() -> Result<Option<Self>> {
        Self::from_lookup(&env_lookup)
    }

    /// `Ok(None)` when OBS is not configured at all
    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Option<Self>> {
        let Some(host) = optional(lookup, "OBS_HOST") else {
            return Ok(None);
        };

        let port = u64_or(lookup, "OBS_PORT", 4455)?;
        let port = u16::try_from(port).map_err(|_| BotError::ConfigInvalid {
            key: "OBS_PORT".to_string(),
            value: port.to_string(),
            message: "not a valid port".to_string(),
        })?;

        Ok(Some(Self {
            host,
            port,
            password: optional(lookup, "OBS_PASSWORD"),
            media_source: required(lookup, "OBS_MEDIA_SOURCE")?,
            media_dir: optional(lookup, "MEDIA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("media")),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::map_lookup;

    #[test]
    fn test_discord_token_fallback() {
        let lookup = map_lookup(&[("DISCORD_BOT_TOKEN", "abc")]);
        assert_eq!(DiscordConfig::from_lookup(&lookup).unwrap().token, "abc");

        let lookup = map_lookup(&[("DISCORD_TOKEN", "new"), ("DISCORD_BOT_TOKEN", "old")]);
        assert_eq!(DiscordConfig::from_lookup(&lookup).unwrap().token, "new");

        assert!(DiscordConfig::from_lookup(&map_lookup(&[])).is_none());
    }

    #[test]
    fn test_twitch_config() {
        assert!(TwitchConfig::from_lookup(&map_lookup(&[])).unwrap().is_none());

        let lookup = map_lookup(&[
            ("TWITCH_USER", "GateBot"),
            ("TWITCH_AUTH", "abc123"),
            ("CHANNELS", " #Streamer, other ,,"),
        ]);
        let config = TwitchConfig::from_lookup(&lookup).unwrap().unwrap();
        assert_eq!(config.username, "gatebot");
        assert_eq!(config.oauth_token, "oauth:abc123");
        assert_eq!(config.channels, vec!["#streamer".to_string(), "#other".to_string()]);

        let lookup = map_lookup(&[("TWITCH_USER", "gatebot"), ("TWITCH_AUTH", "oauth:x")]);
        assert!(matches!(
            TwitchConfig::from_lookup(&lookup),
            Err(BotError::ConfigMissing { key }) if key == "CHANNELS"
        ));

        let lookup = map_lookup(&[
            ("TWITCH_USER", "gatebot"),
            ("TWITCH_AUTH", "oauth:x"),
            ("CHANNELS", " , "),
        ]);
        assert!(matches!(
            TwitchConfig::from_lookup(&lookup),
            Err(BotError::ConfigInvalid { .. })
        ));
    }

    #[test]
    fn test_openai_defaults() {
        let lookup = map_lookup(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_BASE_URL", "http://localhost:8080/v1/"),
        ]);
        let config = OpenAiConfig::from_lookup(&lookup).unwrap();
        assert_eq!(config.model, "gpt-4");
        assert_eq!(config.max_tokens, 100);
        assert_eq!(config.base_url, "http://localhost:8080/v1");
    }

    #[test]
    fn test_sheets_requires_sheet_id() {
        let lookup = map_lookup(&[("GOOGLE_API_KEY", "key")]);
        assert!(matches!(
            SheetsConfig::from_lookup(&lookup),
            Err(BotError::ConfigMissing { key }) if key == "GOOGLE_SHEET_ID"
        ));
    }

    #[test]
    fn test_obs_optional() {
        let lookup = map_lookup(&[]);
        assert!(ObsConfig::from_lookup(&lookup).unwrap().is_none());

        let lookup = map_lookup(&[("OBS_HOST", "localhost"), ("OBS_MEDIA_SOURCE", "Alerts")]);
        let config = ObsConfig::from_lookup(&lookup).unwrap().unwrap();
        assert_eq!(config.port, 4455);
        assert_eq!(config.media_dir, PathBuf::from("media"));

        let lookup = map_lookup(&[("OBS_HOST", "localhost"), ("OBS_PORT", "70000")]);
        assert!(ObsConfig::from_lookup(&lookup).is_err());
    }
}
