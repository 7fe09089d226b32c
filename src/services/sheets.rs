//! Google Sheets allow list

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::collaborators::AllowListLookup;
use crate::config::SheetsConfig;
use crate::error::{Collaborator, CollaboratorError};
use crate::router::normalize_username;

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

pub struct SheetsAllowList {
    config: SheetsConfig,
    http_client: reqwest::Client,
}

impl SheetsAllowList {
    pub fn new(config: SheetsConfig) -> crate::error::Result<Self> {
        Ok(Self {
            config,
            http_client: super::http_client()?,
        })
    }

    fn values_url(&self) -> String {
        format!(
            "https://sheets.googleapis.com/v4/spreadsheets/{}/values/{}",
            urlencoding::encode(&self.config.spreadsheet_id),
            urlencoding::encode(&self.config.range)
        )
    }
}

/// Whether any cell in the range names the user
fn contains_user(range: &ValueRange, user: &str) -> bool {
    range
        .values
        .iter()
        .flatten()
        .any(|cell| normalize_username(cell) == user)
}

#[async_trait]
impl AllowListLookup for SheetsAllowList {
    async fn check(&self, user: &str) -> Result<bool, CollaboratorError> {
        let error = |message: String| CollaboratorError::new(Collaborator::AllowList, message);

        let response = self
            .http_client
            .get(self.values_url())
            .query(&[("key", self.config.api_key.as_str())])
            .send()
            .await
            .map_err(|e| error(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(error(format!("HTTP {}: {}", status, error_text)));
        }

        let range: ValueRange = response.json().await.map_err(|e| error(e.to_string()))?;
        let found = contains_user(&range, user);
        debug!(
            "Allow list lookup for {}: {} ({} rows)",
            user,
            found,
            range.values.len()
        );
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cells_are_normalized() {
        let range: ValueRange = serde_json::from_str(
            r#"{"range": "Sheet1!C1:C3", "majorDimension": "ROWS", "values": [["Username"], [" @Alice "], [], ["bob"]]}"#,
        )
        .unwrap();
        assert!(contains_user(&range, "alice"));
        assert!(contains_user(&range, "bob"));
        assert!(!contains_user(&range, "carol"));
    }

    #[test]
    fn test_empty_sheet() {
        let range: ValueRange = serde_json::from_str(r#"{"range": "Sheet1!C:C"}"#).unwrap();
        assert!(!contains_user(&range, "alice"));
    }

    #[test]
    fn test_values_url_encodes_range() {
        let lookup = SheetsAllowList::new(SheetsConfig {
            api_key: "key".to_string(),
            spreadsheet_id: "abc123".to_string(),
            range: "Sheet1!C:C".to_string(),
        })
        .unwrap();
        assert_eq!(
            lookup.values_url(),
            "https://sheets.googleapis.com/v4/spreadsheets/abc123/values/Sheet1%21C%3AC"
        );
    }
}
