//! Google Safe Browsing adapter

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::collaborators::UrlSafetyChecker;
use crate::config::SafeBrowsingConfig;
use crate::error::{Collaborator, CollaboratorError};

const API_URL: &str = "https://safebrowsing.googleapis.com/v4/threatMatches:find";

pub const UNSAFE_VERDICT: &str = "⚠️ Warning: This link may be unsafe!";
pub const SAFE_VERDICT: &str = "✅ This link appears to be safe.";

#[derive(Deserialize)]
struct FindResponse {
    #[serde(default)]
    matches: Option<Vec<serde_json::Value>>,
}

pub struct SafeBrowsingChecker {
    config: SafeBrowsingConfig,
    http_client: reqwest::Client,
}

impl SafeBrowsingChecker {
    pub fn new(config: SafeBrowsingConfig) -> crate::error::Result<Self> {
        Ok(Self {
            config,
            http_client: super::http_client()?,
        })
    }

    fn request_body(&self, url: &str) -> serde_json::Value {
        json!({
            "client": {
                "clientId": self.config.client_id,
                "clientVersion": env!("CARGO_PKG_VERSION"),
            },
            "threatInfo": {
                "threatTypes": ["MALWARE", "SOCIAL_ENGINEERING", "UNWANTED_SOFTWARE"],
                "platformTypes": ["ANY_PLATFORM"],
                "threatEntryTypes": ["URL"],
                "threatEntries": [{ "url": url }],
            }
        })
    }
}

fn verdict(response: &FindResponse) -> &'static str {
    match &response.matches {
        Some(matches) if !matches.is_empty() => UNSAFE_VERDICT,
        _ => SAFE_VERDICT,
    }
}

#[async_trait]
impl UrlSafetyChecker for SafeBrowsingChecker {
    async fn check(&self, url: &str) -> Result<String, CollaboratorError> {
        let error = |message: String| CollaboratorError::new(Collaborator::UrlSafety, message);

        let response = self
            .http_client
            .post(API_URL)
            .query(&[("key", self.config.api_key.as_str())])
            .json(&self.request_body(url))
            .send()
            .await
            .map_err(|e| error(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(error(format!("HTTP {}: {}", status, error_text)));
        }

        let parsed: FindResponse = response.json().await.map_err(|e| error(e.to_string()))?;
        let verdict = verdict(&parsed);
        debug!("Safe Browsing verdict for {}: {}", url, verdict);
        Ok(verdict.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_response_is_safe() {
        let response: FindResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(verdict(&response), SAFE_VERDICT);
    }

    #[test]
    fn test_matches_are_unsafe() {
        let response: FindResponse = serde_json::from_str(
            r#"{"matches": [{"threatType": "MALWARE", "threat": {"url": "http://bad"}}]}"#,
        )
        .unwrap();
        assert_eq!(verdict(&response), UNSAFE_VERDICT);
    }

    #[test]
    fn test_request_body_lists_url() {
        let checker = SafeBrowsingChecker::new(SafeBrowsingConfig {
            api_key: "key".to_string(),
            client_id: "test".to_string(),
        })
        .unwrap();
        let body = checker.request_body("http://example.com");
        assert_eq!(body["threatInfo"]["threatEntries"][0]["url"], "http://example.com");
        assert_eq!(body["client"]["clientId"], "test");
    }
}
