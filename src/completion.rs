use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

use crate::constants;

#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("failed to reach the completion API: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("completion API returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("failed to decode completion response: {0}")]
    Decode(#[source] reqwest::Error),

    #[error("completion response contained no choices")]
    NoChoice,
}

/// Where and how to reach the chat-completion API.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
}

impl CompletionConfig {
    pub fn from_env() -> Self {
        Self {
            base_url: constants::OPENAI_BASE_URL.clone(),
            api_key: constants::OPENAI_API_KEY.clone(),
            model: constants::ARBITER_MODEL.clone(),
            temperature: constants::TEMPERATURE,
        }
    }
}

// Structures matching the /chat/completions endpoint
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize, Debug)]
struct ChatResponse {
    choices: Vec<Choice>,
    // usage, id, etc. are ignored
}

#[derive(Deserialize, Debug)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize, Debug)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Thin client for a single-turn chat completion.
#[derive(Debug, Clone)]
pub struct CompletionClient {
    http: Client,
    config: CompletionConfig,
}

impl CompletionClient {
    pub fn new(config: CompletionConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &CompletionConfig {
        &self.config
    }

    /// Sends `system` and `question` as a two-message conversation and returns the
    /// first choice's content. A choice without content yields an empty string.
    #[instrument(skip(self, system))]
    pub async fn complete(&self, system: &str, question: &str) -> Result<String, CompletionError> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));

        let request = ChatRequest {
            model: &self.config.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: question,
                },
            ],
            temperature: self.config.temperature,
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(CompletionError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            error!(%status, %body, "Completion API request failed");
            return Err(CompletionError::Status { status, body });
        }

        let completion = response
            .json::<ChatResponse>()
            .await
            .map_err(CompletionError::Decode)?;
        debug!(?completion, "Received completion");

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or(CompletionError::NoChoice)?;

        Ok(choice
            .message
            .and_then(|message| message.content)
            .unwrap_or_default())
    }
}
