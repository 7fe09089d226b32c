//! Command router
//!
//! Turns one chat event into at most one reply. Gating runs in a fixed order:
//! self-filter, verification gate (with its own reminder cooldown), command
//! cooldown, then exactly one downstream action.

mod classify;


pub use classify::{classify, has_marker, CommandClassification};

use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::collaborators::{
    AllowListLookup, ChatTransport, MediaTrigger, TextCompletion, UrlSafetyChecker,
    VerificationStore,
};
use crate::config::RouterConfig;
use crate::messages;
use crate::state::CooldownTracker;

/// Normalize a username: drop leading `@`s and surrounding whitespace, lowercase.
///
/// Applying it twice gives the same key as applying it once.
pub fn normalize_username(name: &str) -> String {
    name.trim_start_matches(|c: char| c == '@' || c.is_whitespace())
        .trim_end()
        .to_lowercase()
}

/// One incoming chat message, already mapped from the platform's type
#[derive(Debug, Clone)]
pub struct ChatEvent {
    pub channel_id: String,
    /// Username as the platform reports it (not normalized)
    pub username: String,
    pub message: String,
    /// Sent by the bot's own account
    pub is_self: bool,
}

/// A collaborator request the router issued while handling an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideEffect {
    AllowListLookup(String),
    VerifyStoreWrite(String),
    SafetyCheck(String),
    MediaTrigger(String),
    CompletionRequest(String),
}

/// Outcome of one event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouterDecision {
    pub reply: Option<String>,
    pub side_effects: Vec<SideEffect>,
}

impl RouterDecision {
    fn silent() -> Self {
        Self::default()
    }

    fn reply(text: impl Into<String>) -> Self {
        Self {
            reply: Some(text.into()),
            side_effects: Vec::new(),
        }
    }
}

/// Everything the router calls out to
#[derive(Clone)]
pub struct Collaborators {
    pub verification_store: Arc<dyn VerificationStore>,
    pub allow_list: Arc<dyn AllowListLookup>,
    pub url_safety: Arc<dyn UrlSafetyChecker>,
    pub completion: Arc<dyn TextCompletion>,
    pub media: Option<Arc<dyn MediaTrigger>>,
}

/// Owns all per-user gating state for one deployment
pub struct Router {
    config: RouterConfig,
    collaborators: Collaborators,
    command_cooldowns: CooldownTracker,
    reminder_cooldowns: CooldownTracker,
    user_locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
}

impl Router {
    pub fn new(mut config: RouterConfig, collaborators: Collaborators) -> Self {
        if collaborators.media.is_none() && config.play_command.is_some() {
            debug!("No media trigger configured, disabling play command");
            config.play_command = None;
        }

        Self {
            config,
            collaborators,
            command_cooldowns: CooldownTracker::new(),
            reminder_cooldowns: CooldownTracker::new(),
            user_locks: DashMap::new(),
        }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Handle an event and send its reply, if any
    pub async fn dispatch(
        &self,
        event: &ChatEvent,
        transport: &dyn ChatTransport,
    ) -> RouterDecision {
        let decision = self.handle(event).await;

        if let Some(reply) = &decision.reply {
            if let Err(e) = transport.send(&event.channel_id, reply).await {
                error!("Failed to deliver reply: {}", e);
            }
        }

        decision
    }

    /// Handle an event at the current wall-clock time
    pub async fn handle(&self, event: &ChatEvent) -> RouterDecision {
        self.handle_at(event, chrono::Utc::now().timestamp_millis()).await
    }

    /// Handle an event as if it arrived at `now` (epoch millis)
    pub async fn handle_at(&self, event: &ChatEvent, now: i64) -> RouterDecision {
        if event.is_self {
            return RouterDecision::silent();
        }

        let user = normalize_username(&event.username);
        if user.is_empty() || self.config.bot_identity.as_deref() == Some(user.as_str()) {
            return RouterDecision::silent();
        }

        if self.config.fallback_requires_marker
            && !has_marker(&event.message, self.config.command_marker)
        {
            return RouterDecision::silent();
        }

        let span = info_span!(
            "chat_event",
            event_id = %uuid::Uuid::new_v4(),
            channel = %event.channel_id,
            user = %user,
        );

        let lock = self.user_lock(&user);
        let decision = async {
            let _guard = lock.lock().await;
            self.route(event, &user, now).await
        }
        .instrument(span)
        .await;

        drop(lock);
        self.user_locks.remove_if(&user, |_, l| Arc::strong_count(l) == 1);

        decision
    }

    /// Forget cooldown entries whose window has passed
    pub fn prune_cooldowns(&self, now: i64) {
        self.command_cooldowns.prune(now, self.config.cooldown_ms);
        self.reminder_cooldowns.prune(now, self.config.reminder_cooldown_ms);
        debug!(
            "Cooldown entries after prune: {} command, {} reminder",
            self.command_cooldowns.len(),
            self.reminder_cooldowns.len()
        );
    }

    fn user_lock(&self, user: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.user_locks
            .entry(user.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Gate and route one event; the caller holds the user's lock
    async fn route(&self, event: &ChatEvent, user: &str, now: i64) -> RouterDecision {
        let classification = classify(
            &event.message,
            self.config.command_marker,
            self.config.play_command.as_deref(),
        );
        let name = event.username.trim().trim_start_matches('@');
        debug!("Classified message as {}", classification.name());

        if self.needs_verification(&classification)
            && !self.collaborators.verification_store.is_verified(user).await
        {
            return match self.reminder_cooldowns.try_acquire(
                user,
                now,
                self.config.reminder_cooldown_ms,
            ) {
                Ok(()) => {
                    info!("Unverified user tried '{}', sending reminder", classification.name());
                    RouterDecision::reply(messages::verify_reminder_message(
                        name,
                        self.config.command_marker,
                    ))
                }
                Err(remaining) => {
                    debug!("Reminder suppressed for another {}ms", remaining);
                    RouterDecision::silent()
                }
            };
        }

        if self.config.cooldown_ms > 0 && !self.is_exempt(user) {
            if let Err(remaining) =
                self.command_cooldowns.try_acquire(user, now, self.config.cooldown_ms)
            {
                info!("Command cooldown active for {}ms", remaining);
                return RouterDecision::reply(messages::cooldown_message(name, remaining));
            }
        }

        match classification {
            CommandClassification::Apply => {
                RouterDecision::reply(messages::apply_message(name, &self.config.apply_link))
            }
            CommandClassification::Verify => self.verify(user, name).await,
            CommandClassification::SafeSearch(url) => self.safe_search(name, url).await,
            CommandClassification::PlayMedia(asset) => self.play(name, asset).await,
            CommandClassification::Fallback(text) => self.fallback(name, text).await,
        }
    }

    fn needs_verification(&self, classification: &CommandClassification) -> bool {
        if !self.config.verification_enabled || classification.allowed_unverified() {
            return false;
        }
        match classification {
            CommandClassification::SafeSearch(_) => self.config.ss_requires_verification,
            _ => true,
        }
    }

    fn is_exempt(&self, user: &str) -> bool {
        self.config.exempt_identity.as_deref() == Some(user)
    }

    async fn verify(&self, user: &str, name: &str) -> RouterDecision {
        let store = &self.collaborators.verification_store;
        if store.is_verified(user).await {
            return RouterDecision::reply(messages::already_verified_message(name));
        }

        let mut decision = RouterDecision::silent();
        decision
            .side_effects
            .push(SideEffect::AllowListLookup(user.to_string()));

        let listed = match self.collaborators.allow_list.check(user).await {
            Ok(listed) => listed,
            Err(e) => {
                warn!("Allow list lookup failed: {}", e);
                decision.reply = Some(e.user_message().to_string());
                return decision;
            }
        };

        if !listed {
            info!("User not found in allow list");
            decision.reply = Some(messages::verify_not_found_message(
                name,
                &self.config.apply_link,
            ));
            return decision;
        }

        decision
            .side_effects
            .push(SideEffect::VerifyStoreWrite(user.to_string()));
        decision.reply = Some(match store.mark_verified(user).await {
            Ok(()) => {
                info!("User verified");
                messages::verify_success_message(name)
            }
            Err(e) => {
                error!("Failed to persist verification: {}", e);
                e.user_message().to_string()
            }
        });
        decision
    }

    async fn safe_search(&self, name: &str, url: String) -> RouterDecision {
        let reply = match self.collaborators.url_safety.check(&url).await {
            Ok(verdict) => messages::safe_search_message(name, &verdict),
            Err(e) => {
                warn!("URL safety check failed: {}", e);
                e.user_message().to_string()
            }
        };

        RouterDecision {
            reply: Some(reply),
            side_effects: vec![SideEffect::SafetyCheck(url)],
        }
    }

    async fn play(&self, name: &str, asset: String) -> RouterDecision {
        // Classification only yields PlayMedia when a trigger exists
        let Some(media) = &self.collaborators.media else {
            return RouterDecision::silent();
        };

        let reply = match media.play(&asset).await {
            Ok(true) => {
                info!("Playing media '{}'", asset);
                messages::play_success_message(name, &asset)
            }
            Ok(false) => messages::play_not_found_message(name, &asset),
            Err(e) => {
                warn!("Media trigger failed: {}", e);
                e.user_message().to_string()
            }
        };

        RouterDecision {
            reply: Some(reply),
            side_effects: vec![SideEffect::MediaTrigger(asset)],
        }
    }

    async fn fallback(&self, name: &str, text: String) -> RouterDecision {
        if text.is_empty() {
            return RouterDecision::reply(messages::empty_prompt_message(
                self.config.command_marker,
            ));
        }

        let prompt = if self.config.completion_include_username {
            format!("Message from user {}: {}", name, text)
        } else {
            text
        };

        let reply = match self.collaborators.completion.complete(&prompt).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Completion failed: {}", e);
                e.user_message().to_string()
            }
        };

        RouterDecision {
            reply: Some(reply),
            side_effects: vec![SideEffect::CompletionRequest(prompt)],
        }
    }
}
