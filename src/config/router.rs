use super::{bool_or, env_lookup, optional, u64_or, Lookup};
use crate::error::{BotError, Result};

pub const DEFAULT_COMMAND_MARKER: char = '!';
pub const DEFAULT_REMINDER_COOLDOWN_MS: u64 = 60_000;
pub const DEFAULT_PLAY_COMMAND: &str = "play";

/// Settings that shape how the router gates and classifies chat
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Prefix that marks a structured command
    pub command_marker: char,

    /// Minimum time between two commands of the same user; 0 disables it
    pub cooldown_ms: u64,

    /// Minimum time between two "verify first" reminders to the same user
    pub reminder_cooldown_ms: u64,

    /// Normalized identity that skips the command cooldown
    pub exempt_identity: Option<String>,

    /// Normalized identity of the bot itself
    pub bot_identity: Option<String>,

    /// Gate commands behind the allow-list verification
    pub verification_enabled: bool,

    /// Whether `ss` is gated like every other command
    pub ss_requires_verification: bool,

    /// Link sent by `apply` and on a failed `verify`
    pub apply_link: String,

    /// Keyword for media playback, `None` when no media trigger is wired up
    pub play_command: Option<String>,

    /// Ignore unprefixed chat instead of forwarding it to the completion API
    pub fallback_requires_marker: bool,

    /// Prefix completion prompts with the sender's name
    pub completion_include_username: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            command_marker: DEFAULT_COMMAND_MARKER,
            cooldown_ms: 0,
            reminder_cooldown_ms: DEFAULT_REMINDER_COOLDOWN_MS,
            exempt_identity: None,
            bot_identity: None,
            verification_enabled: false,
            ss_requires_verification: true,
            apply_link: String::new(),
            play_command: Some(DEFAULT_PLAY_COMMAND.to_string()),
            fallback_requires_marker: false,
            completion_include_username: false,
        }
    }
}

impl RouterConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(&env_lookup)
    }

    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self> {
        let command_marker = match optional(lookup, "COMMAND_MARKER") {
            None => DEFAULT_COMMAND_MARKER,
            Some(v) => {
                let mut chars = v.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) if !c.is_whitespace() => c,
                    _ => {
                        return Err(BotError::ConfigInvalid {
                            key: "COMMAND_MARKER".to_string(),
                            value: v,
                            message: "expected a single character".to_string(),
                        })
                    }
                }
            }
        };

        let verification_enabled = bool_or(lookup, "VERIFICATION_ENABLED", false)?;
        let apply_link = optional(lookup, "APPLY_LINK").unwrap_or_default();
        if verification_enabled && apply_link.is_empty() {
            return Err(BotError::ConfigMissing {
                key: "APPLY_LINK".to_string(),
            });
        }

        Ok(Self {
            command_marker,
            cooldown_ms: u64_or(lookup, "COOLDOWN_MS", 0)?,
            reminder_cooldown_ms: u64_or(
                lookup,
                "REMINDER_COOLDOWN_MS",
                DEFAULT_REMINDER_COOLDOWN_MS,
            )?,
            exempt_identity: optional(lookup, "EXEMPT_USER")
                .map(|u| crate::router::normalize_username(&u)),
            bot_identity: None,
            verification_enabled,
            ss_requires_verification: bool_or(lookup, "SS_REQUIRES_VERIFICATION", true)?,
            apply_link,
            play_command: Some(
                optional(lookup, "PLAY_COMMAND")
                    .map(|c| c.to_lowercase())
                    .unwrap_or_else(|| DEFAULT_PLAY_COMMAND.to_string()),
            ),
            fallback_requires_marker: bool_or(lookup, "FALLBACK_REQUIRES_MARKER", false)?,
            completion_include_username: bool_or(lookup, "COMPLETION_INCLUDE_USERNAME", false)?,
        })
    }

    /// Set the bot's own identity once the chat client knows it
    pub fn with_bot_identity(mut self, identity: &str) -> Self {
        self.bot_identity = Some(crate::router::normalize_username(identity));
        self
    }
}
