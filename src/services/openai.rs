//! OpenAI chat completions adapter

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::collaborators::TextCompletion;
use crate::config::OpenAiConfig;
use crate::error::{Collaborator, CollaboratorError};

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful chatbot.";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAiCompletion {
    config: OpenAiConfig,
    system_prompt: String,
    http_client: reqwest::Client,
}

impl OpenAiCompletion {
    pub fn new(config: OpenAiConfig, system_prompt: String) -> crate::error::Result<Self> {
        Ok(Self {
            config,
            system_prompt,
            http_client: super::http_client()?,
        })
    }

    /// Build the client, reading the system prompt from the context file
    pub async fn from_config(config: OpenAiConfig) -> crate::error::Result<Self> {
        let system_prompt = match tokio::fs::read_to_string(&config.context_path).await {
            Ok(content) if !content.trim().is_empty() => {
                info!(
                    "Using {} as the system prompt",
                    config.context_path.display()
                );
                content.trim().to_string()
            }
            Ok(_) => DEFAULT_SYSTEM_PROMPT.to_string(),
            Err(e) => {
                warn!(
                    "Could not read context file {}: {}, using default prompt",
                    config.context_path.display(),
                    e
                );
                DEFAULT_SYSTEM_PROMPT.to_string()
            }
        };
        Self::new(config, system_prompt)
    }

    fn error(message: impl Into<String>) -> CollaboratorError {
        CollaboratorError::new(Collaborator::Completion, message)
    }
}

#[async_trait]
impl TextCompletion for OpenAiCompletion {
    async fn complete(&self, prompt: &str) -> Result<String, CollaboratorError> {
        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &self.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens: self.config.max_tokens,
        };

        debug!("Requesting completion from {}", self.config.model);
        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Self::error(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(Self::error(format!("HTTP {}: {}", status, error_text)));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| Self::error(e.to_string()))?;

        parse_choice(parsed)
    }
}

fn parse_choice(response: ChatResponse) -> Result<String, CollaboratorError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| OpenAiCompletion::error("response contained no text"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_first_choice() {
        let response: ChatResponse = serde_json::from_str(
            r#"{"choices": [{"message": {"role": "assistant", "content": "Hi!"}}, {"message": {"content": "no"}}]}"#,
        )
        .unwrap();
        assert_eq!(parse_choice(response).unwrap(), "Hi!");
    }

    #[test]
    fn test_empty_choices_is_error() {
        let response: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        let err = parse_choice(response).unwrap_err();
        assert_eq!(err.collaborator, Collaborator::Completion);
    }

    #[test]
    fn test_request_shape() {
        let body = ChatRequest {
            model: "gpt-4",
            messages: vec![ChatMessage {
                role: "user",
                content: "hello",
            }],
            max_tokens: 100,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["messages"][0]["content"], "hello");
        assert_eq!(json["max_tokens"], 100);
    }
}
