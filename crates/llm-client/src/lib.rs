//! Chat completion client used by recall nodes.
//!
//! This crate provides:
//! - `ChatClient`: the narrow contract the pipeline depends on
//! - `OpenAiClient`: an OpenAI-compatible `/chat/completions` implementation
//! - `Message` and `LlmClientError`
//!
//! Every call takes an optional deadline. When it passes, the call returns
//! `LlmClientError::DeadlineExceeded` instead of waiting for the network.

pub mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Instant;

pub use openai::OpenAiClient;

/// Errors that can occur when talking to the chat endpoint
#[derive(Error, Debug)]
pub enum LlmClientError {
    #[error("llm request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("llm api error (status {code}): {body}")]
    Status { code: u16, body: String },

    #[error("failed to parse llm response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("no choices returned from llm")]
    EmptyChoices,

    #[error("llm call exceeded its deadline")]
    DeadlineExceeded,
}

/// One chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Answers a conversation with free text.
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn chat(
        &self,
        messages: &[Message],
        deadline: Option<Instant>,
    ) -> Result<String, LlmClientError>;
}
