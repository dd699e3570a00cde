//! OpenAI-compatible chat completion client.
//!
//! The configured endpoint is used as-is (the full `.../chat/completions`
//! URL), so any compatible provider works.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, error, instrument};

use crate::{ChatClient, LlmClientError, Message};

/// Upper bound for a single HTTP exchange regardless of the caller's deadline.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

/// Client for one configured model.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenAiClient {
    /// Create a client.
    ///
    /// # Arguments
    /// * `endpoint` - Full chat completion URL
    /// * `api_key` - Sent as a bearer token
    /// * `model` - Model name placed in every request
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, LlmClientError> {
        let http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send(&self, messages: &[Message]) -> Result<String, LlmClientError> {
        let request = ChatRequest {
            model: &self.model,
            messages,
        };
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            error!("LLM endpoint returned status {}", status);
            return Err(LlmClientError::Status {
                code: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&body)?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or(LlmClientError::EmptyChoices)
    }
}

#[async_trait]
impl ChatClient for OpenAiClient {
    #[instrument(skip(self, messages), fields(model = %self.model, messages = messages.len()))]
    async fn chat(
        &self,
        messages: &[Message],
        deadline: Option<Instant>,
    ) -> Result<String, LlmClientError> {
        debug!("Sending chat request to {}", self.endpoint);
        let content = match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, self.send(messages))
                .await
                .map_err(|_| LlmClientError::DeadlineExceeded)??,
            None => self.send(messages).await?,
        };
        debug!("Received {} bytes of chat content", content.len());
        Ok(content)
    }
}
