//! Media playback through an OBS media source

use async_trait::async_trait;
use obws::common::MediaAction;
use obws::requests::inputs::SetSettings;
use obws::Client;
use serde_json::json;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::collaborators::MediaTrigger;
use crate::config::ObsConfig;
use crate::error::{Collaborator, CollaboratorError};

const MEDIA_EXTENSIONS: &[&str] = &["mp4", "webm", "mov", "mkv", "mp3", "wav", "ogg", "gif"];
const MAX_ASSET_NAME_LEN: usize = 64;

/// Asset names are plain identifiers so they can never escape the media dir
pub fn is_valid_asset_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_ASSET_NAME_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Find `<name>.<ext>` in `dir`, ignoring case
pub async fn resolve_asset(dir: &Path, name: &str) -> std::io::Result<Option<PathBuf>> {
    if !is_valid_asset_name(name) {
        return Ok(None);
    }

    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let stem_matches = path
            .file_stem()
            .and_then(|s| s.to_str())
            .is_some_and(|s| s.eq_ignore_ascii_case(name));
        let known_extension = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| MEDIA_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));

        if stem_matches && known_extension && entry.file_type().await?.is_file() {
            return Ok(Some(path));
        }
    }

    Ok(None)
}

pub struct ObsMediaTrigger {
    config: ObsConfig,
    client: RwLock<Option<Client>>,
}

impl ObsMediaTrigger {
    pub fn new(config: ObsConfig) -> Self {
        Self {
            config,
            client: RwLock::new(None),
        }
    }

    fn error(message: impl Into<String>) -> CollaboratorError {
        CollaboratorError::new(Collaborator::Media, message)
    }

    async fn connect(&self) -> Result<Client, CollaboratorError> {
        info!(
            "Connecting to OBS at {}:{}",
            self.config.host, self.config.port
        );
        Client::connect(
            &self.config.host,
            self.config.port,
            self.config.password.as_deref(),
        )
        .await
        .map_err(|e| Self::error(format!("connection failed: {}", e)))
    }

    async fn show_file(&self, client: &Client, file: &Path) -> Result<(), obws::error::Error> {
        let settings = json!({ "local_file": file.to_string_lossy() });
        client
            .inputs()
            .set_settings(SetSettings {
                input: self.config.media_source.as_str().into(),
                settings: &settings,
                overlay: Some(true),
            })
            .await?;
        client
            .media_inputs()
            .trigger_action(self.config.media_source.as_str().into(), MediaAction::Restart)
            .await
    }
}

#[async_trait]
impl MediaTrigger for ObsMediaTrigger {
    async fn play(&self, asset: &str) -> Result<bool, CollaboratorError> {
        let file = match resolve_asset(&self.config.media_dir, asset).await {
            Ok(Some(file)) => file,
            Ok(None) => {
                debug!("No media asset named '{}'", asset);
                return Ok(false);
            }
            Err(e) => {
                return Err(Self::error(format!(
                    "cannot read {}: {}",
                    self.config.media_dir.display(),
                    e
                )))
            }
        };
        let file = tokio::fs::canonicalize(&file).await.unwrap_or(file);

        let mut guard = self.client.write().await;
        if guard.is_none() {
            *guard = Some(self.connect().await?);
        }
        let Some(client) = guard.as_ref() else {
            return Err(Self::error("not connected"));
        };

        if let Err(e) = self.show_file(client, &file).await {
            warn!("OBS request failed, dropping connection: {}", e);
            *guard = None;
            return Err(Self::error(e.to_string()));
        }

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_name_validation() {
        assert!(is_valid_asset_name("party_horn-2"));
        assert!(!is_valid_asset_name(""));
        assert!(!is_valid_asset_name("../secret"));
        assert!(!is_valid_asset_name("a b"));
        assert!(!is_valid_asset_name(&"x".repeat(65)));
    }

    #[tokio::test]
    async fn test_resolve_asset() {
        let dir = std::env::temp_dir().join(format!("chatgate-media-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("Horn.MP4"), b"").await.unwrap();
        tokio::fs::write(dir.join("notes.txt"), b"").await.unwrap();

        let found = resolve_asset(&dir, "horn").await.unwrap();
        assert_eq!(found, Some(dir.join("Horn.MP4")));
        assert_eq!(resolve_asset(&dir, "notes").await.unwrap(), None);
        assert_eq!(resolve_asset(&dir, "missing").await.unwrap(), None);
        assert_eq!(resolve_asset(&dir, "../horn").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unknown_asset_does_not_touch_obs() {
        let dir = std::env::temp_dir().join(format!("chatgate-media-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir).await.unwrap();

        let trigger = ObsMediaTrigger::new(ObsConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            password: None,
            media_source: "Alerts".to_string(),
            media_dir: dir,
        });
        assert!(!trigger.play("horn").await.unwrap());
        assert!(trigger.client.read().await.is_none());
    }

    #[tokio::test]
    async fn test_missing_media_dir_is_error() {
        let trigger = ObsMediaTrigger::new(ObsConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            password: None,
            media_source: "Alerts".to_string(),
            media_dir: PathBuf::from("/nonexistent/chatgate-media"),
        });
        let err = trigger.play("horn").await.unwrap_err();
        assert_eq!(err.collaborator, Collaborator::Media);
    }
}
