use std::fmt;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BotError {
    // Configuration errors
    #[error("Missing required configuration: {key}")]
    ConfigMissing { key: String },

    #[error("Invalid value for {key}: '{value}' ({message})")]
    ConfigInvalid {
        key: String,
        value: String,
        message: String,
    },

    #[error("Failed to parse file '{path}': {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    // State errors
    #[error("Failed to save state to '{path}': {source}")]
    StateSave {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to load state from '{path}': {source}")]
    StateLoad {
        path: String,
        #[source]
        source: std::io::Error,
    },

    // Outbound errors
    #[error("Failed to send reply to channel {channel}: {message}")]
    Transport { channel: String, message: String },

    // Generic errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl From<serde_json::Error> for BotError {
    fn from(err: serde_json::Error) -> Self {
        BotError::Internal {
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BotError>;

/// External service the router talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collaborator {
    AllowList,
    UrlSafety,
    Completion,
    Media,
    VerificationStore,
}

impl Collaborator {
    /// Fixed reply shown in chat when this collaborator fails
    pub fn user_message(self) -> &'static str {
        match self {
            Collaborator::AllowList => "❌ Error checking the verification list.",
            Collaborator::UrlSafety => "❌ Error checking the link.",
            Collaborator::Completion => "⚠️ Error processing your request.",
            Collaborator::Media => "❌ Error playing that media.",
            Collaborator::VerificationStore => {
                "❌ Error saving your verification. Please try again later."
            }
        }
    }
}

impl fmt::Display for Collaborator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Collaborator::AllowList => "allow list",
            Collaborator::UrlSafety => "url safety check",
            Collaborator::Completion => "text completion",
            Collaborator::Media => "media trigger",
            Collaborator::VerificationStore => "verification store",
        };
        f.write_str(name)
    }
}

/// Failure of a single call to an external collaborator
#[derive(Error, Debug)]
#[error("{collaborator} failed: {message}")]
pub struct CollaboratorError {
    pub collaborator: Collaborator,
    pub message: String,
}

impl CollaboratorError {
    pub fn new(collaborator: Collaborator, message: impl Into<String>) -> Self {
        Self {
            collaborator,
            message: message.into(),
        }
    }

    /// The fixed chat reply for this failure
    pub fn user_message(&self) -> &'static str {
        self.collaborator.user_message()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collaborator_error_messages_are_distinct() {
        let all = [
            Collaborator::AllowList,
            Collaborator::UrlSafety,
            Collaborator::Completion,
            Collaborator::Media,
            Collaborator::VerificationStore,
        ];
        let mut seen = std::collections::HashSet::new();
        for c in all {
            assert!(seen.insert(c.user_message()), "duplicate message for {}", c);
        }
    }

    #[test]
    fn test_collaborator_error_display() {
        let err = CollaboratorError::new(Collaborator::UrlSafety, "HTTP 500");
        assert_eq!(err.to_string(), "url safety check failed: HTTP 500");
        assert_eq!(err.user_message(), "❌ Error checking the link.");
    }
}
