use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::collaborators::VerificationStore;
use crate::error::{BotError, Collaborator, CollaboratorError, Result};
use crate::router::normalize_username;

/// Normalized username -> verified flag, stored as a plain JSON object
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VerifiedUsers {
    users: HashMap<String, bool>,
}

impl VerifiedUsers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON file, creating an empty one if it does not exist
    pub async fn load(path: &Path) -> Result<Self> {
        let display = path.display().to_string();
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No verified users file at {}, creating an empty one", path.display());
                let empty = Self::new();
                empty.save(path).await?;
                return Ok(empty);
            }
            Err(e) => {
                return Err(BotError::StateLoad {
                    path: display,
                    source: e,
                })
            }
        };

        if content.trim().is_empty() {
            return Ok(Self::new());
        }

        let raw: HashMap<String, bool> =
            serde_json::from_str(&content).map_err(|e| BotError::ConfigParse {
                path: display,
                source: e,
            })?;

        // Older files were keyed by whatever the chat client reported
        let mut users = HashMap::with_capacity(raw.len());
        for (name, verified) in raw {
            let key = normalize_username(&name);
            if key.is_empty() {
                continue;
            }
            let entry = users.entry(key).or_insert(false);
            *entry = *entry || verified;
        }

        Ok(Self { users })
    }

    /// Save to a JSON file atomically
    pub async fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| BotError::StateSave {
                    path: path.display().to_string(),
                    source: e,
                })?;
        }

        // Write to temp file first, then rename for atomicity
        let mut temp_path = path.as_os_str().to_owned();
        temp_path.push(".tmp");
        let temp_path = PathBuf::from(temp_path);

        tokio::fs::write(&temp_path, &content)
            .await
            .map_err(|e| BotError::StateSave {
                path: path.display().to_string(),
                source: e,
            })?;

        tokio::fs::rename(&temp_path, path)
            .await
            .map_err(|e| BotError::StateSave {
                path: path.display().to_string(),
                source: e,
            })?;

        Ok(())
    }

    pub fn is_verified(&self, user: &str) -> bool {
        self.users.get(user).copied().unwrap_or(false)
    }

    /// Returns false if the user was already verified
    pub fn mark_verified(&mut self, user: &str) -> bool {
        !self.users.insert(user.to_string(), true).unwrap_or(false)
    }

    fn unmark(&mut self, user: &str) {
        self.users.remove(user);
    }

    pub fn verified_count(&self) -> usize {
        self.users.values().filter(|v| **v).count()
    }
}

/// File-backed verification store shared by every router
pub struct JsonVerificationStore {
    path: PathBuf,
    users: tokio::sync::RwLock<VerifiedUsers>,
}

impl JsonVerificationStore {
    pub fn new(path: impl Into<PathBuf>, users: VerifiedUsers) -> Self {
        Self {
            path: path.into(),
            users: tokio::sync::RwLock::new(users),
        }
    }

    /// Load the store.
    ///
    /// A file that does not parse is moved to `<path>.corrupt` and the store
    /// starts empty, so the next save cannot overwrite the only copy. Any
    /// other load error is returned.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let users = match VerifiedUsers::load(&path).await {
            Ok(users) => users,
            Err(e @ BotError::ConfigParse { .. }) => {
                let aside = corrupt_path(&path);
                tokio::fs::rename(&path, &aside)
                    .await
                    .map_err(|source| BotError::StateSave {
                        path: aside.display().to_string(),
                        source,
                    })?;
                warn!(
                    "Could not load verified users: {}, moved it to {} and starting empty",
                    e,
                    aside.display()
                );
                VerifiedUsers::new()
            }
            Err(e) => return Err(e),
        };
        info!(
            "Loaded {} verified users from {}",
            users.verified_count(),
            path.display()
        );
        Ok(Self::new(path, users))
    }
}

fn corrupt_path(path: &Path) -> PathBuf {
    let mut aside = path.as_os_str().to_owned();
    aside.push(".corrupt");
    PathBuf::from(aside)
}

#[async_trait]
impl VerificationStore for JsonVerificationStore {
    async fn is_verified(&self, user: &str) -> bool {
        self.users.read().await.is_verified(user)
    }

    async fn mark_verified(&self, user: &str) -> std::result::Result<(), CollaboratorError> {
        // Writers hold the lock across the save so files never interleave
        let mut users = self.users.write().await;
        if !users.mark_verified(user) {
            debug!("{} was already verified", user);
            return Ok(());
        }

        if let Err(e) = users.save(&self.path).await {
            users.unmark(user);
            return Err(CollaboratorError::new(
                Collaborator::VerificationStore,
                e.to_string(),
            ));
        }

        info!("Persisted verification for {}", user);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("chatgate-{}", uuid::Uuid::new_v4()))
            .join(name)
    }

    #[tokio::test]
    async fn test_missing_file_is_created_empty() {
        let path = temp_file("verified_users.json");
        let users = VerifiedUsers::load(&path).await.unwrap();
        assert_eq!(users.verified_count(), 0);

        let written = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(written.trim(), "{}");
    }

    #[tokio::test]
    async fn test_empty_file_is_empty_store() {
        let path = temp_file("verified_users.json");
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        tokio::fs::write(&path, "  \n").await.unwrap();

        let users = VerifiedUsers::load(&path).await.unwrap();
        assert_eq!(users.verified_count(), 0);
    }

    #[tokio::test]
    async fn test_keys_are_normalized_on_load() {
        let path = temp_file("verified_users.json");
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        tokio::fs::write(&path, r#"{"@Alice": true, "bob": false}"#)
            .await
            .unwrap();

        let users = VerifiedUsers::load(&path).await.unwrap();
        assert!(users.is_verified("alice"));
        assert!(!users.is_verified("bob"));
        assert!(!users.is_verified("@Alice"));
    }

    #[tokio::test]
    async fn test_corrupt_file_is_error() {
        let path = temp_file("verified_users.json");
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        tokio::fs::write(&path, "{not json").await.unwrap();

        assert!(matches!(
            VerifiedUsers::load(&path).await,
            Err(BotError::ConfigParse { .. })
        ));
    }

    #[tokio::test]
    async fn test_mark_verified_persists() {
        let path = temp_file("verified_users.json");
        let store = JsonVerificationStore::open(&path).await.unwrap();

        assert!(!store.is_verified("carol").await);
        store.mark_verified("carol").await.unwrap();
        assert!(store.is_verified("carol").await);

        let reloaded = VerifiedUsers::load(&path).await.unwrap();
        assert!(reloaded.is_verified("carol"));
        assert_eq!(reloaded.verified_count(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_kept_aside() {
        let path = temp_file("verified_users.json");
        let original = r#"{"alice": true, "bob": true,}"#;
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        tokio::fs::write(&path, original).await.unwrap();

        let store = JsonVerificationStore::open(&path).await.unwrap();
        store.mark_verified("carol").await.unwrap();

        let kept = tokio::fs::read_to_string(corrupt_path(&path)).await.unwrap();
        assert_eq!(kept, original);

        let current = VerifiedUsers::load(&path).await.unwrap();
        assert!(current.is_verified("carol"));
        assert!(!current.is_verified("alice"));
    }

    #[tokio::test]
    async fn test_failed_save_rolls_back_flag() {
        // A regular file where the parent directory should be makes every save fail
        let blocker = temp_file("blocker");
        tokio::fs::create_dir_all(blocker.parent().unwrap()).await.unwrap();
        tokio::fs::write(&blocker, "").await.unwrap();
        let store =
            JsonVerificationStore::new(blocker.join("verified_users.json"), VerifiedUsers::new());

        let err = store.mark_verified("erin").await.unwrap_err();
        assert_eq!(err.collaborator, Collaborator::VerificationStore);
        assert!(!store.is_verified("erin").await);
    }

    #[test]
    fn test_mark_verified_reports_transition_once() {
        let mut users = VerifiedUsers::new();
        assert!(users.mark_verified("dave"));
        assert!(!users.mark_verified("dave"));
    }
}
