//! Env-style configuration
//!
//! Every config struct has a `from_env()` constructor reading the process
//! environment (after `dotenv`), backed by `from_lookup()` so tests can feed
//! values from a plain map.

pub mod router;
pub mod services;

pub use router::RouterConfig;
pub use services::{
    DiscordConfig, ObsConfig, OpenAiConfig, SafeBrowsingConfig, SheetsConfig, TwitchConfig,
};

use crate::error::{BotError, Result};

/// Source of configuration values keyed by variable name
pub type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Read from the process environment
pub fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// A value that must be present and non-empty
pub(crate) fn required(lookup: Lookup<'_>, key: &str) -> Result<String> {
    optional(lookup, key).ok_or_else(|| BotError::ConfigMissing {
        key: key.to_string(),
    })
}

/// A trimmed value, `None` when unset or blank
pub(crate) fn optional(lookup: Lookup<'_>, key: &str) -> Option<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub(crate) fn bool_or(lookup: Lookup<'_>, key: &str, default: bool) -> Result<bool> {
    match optional(lookup, key) {
        None => Ok(default),
        Some(v) => match v.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(BotError::ConfigInvalid {
                key: key.to_string(),
                value: v,
                message: "expected true or false".to_string(),
            }),
        },
    }
}

pub(crate) fn u64_or(lookup: Lookup<'_>, key: &str, default: u64) -> Result<u64> {
    match optional(lookup, key) {
        None => Ok(default),
        Some(v) => v.parse().map_err(|_| BotError::ConfigInvalid {
            key: key.to_string(),
            value: v,
            message: "expected a non-negative integer".to_string(),
        }),
    }
}

#[cfg(test)]
pub(crate) fn map_lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: std::collections::HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key: &str| map.get(key).cloned()
}
