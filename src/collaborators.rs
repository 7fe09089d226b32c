//! Narrow interfaces the router calls out through
//!
//! Every adapter in `services` implements one of these; tests swap in
//! in-memory fakes.

use async_trait::async_trait;

use crate::error::{CollaboratorError, Result};

/// Durable record of which normalized usernames are verified
#[async_trait]
pub trait VerificationStore: Send + Sync {
    async fn is_verified(&self, user: &str) -> bool;

    /// Mark the user verified and persist before returning
    async fn mark_verified(&self, user: &str) -> std::result::Result<(), CollaboratorError>;
}

/// Externally maintained list of usernames allowed to verify
#[async_trait]
pub trait AllowListLookup: Send + Sync {
    async fn check(&self, user: &str) -> std::result::Result<bool, CollaboratorError>;
}

/// Returns a human readable verdict for a URL
#[async_trait]
pub trait UrlSafetyChecker: Send + Sync {
    async fn check(&self, url: &str) -> std::result::Result<String, CollaboratorError>;
}

#[async_trait]
pub trait TextCompletion: Send + Sync {
    async fn complete(&self, prompt: &str) -> std::result::Result<String, CollaboratorError>;
}

/// Plays a named media asset; `Ok(false)` when no such asset exists
#[async_trait]
pub trait MediaTrigger: Send + Sync {
    async fn play(&self, asset: &str) -> std::result::Result<bool, CollaboratorError>;
}

/// Outbound chat messages
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(&self, channel_id: &str, text: &str) -> Result<()>;
}
