//! The inbound completion request shape, matching the OpenAI-compatible
//! `POST /v1/chat/completions` body (spec §6).

use serde::{Deserialize, Serialize};

/// One message in a chat-style completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// `"system"`, `"user"`, or `"assistant"`.
    pub role: String,
    /// Message body.
    pub content: String,
}

/// `CompletionRequest` as received by the HTTP layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Model name; its prefix selects the provider (spec §4.7 step 1).
    pub model: String,
    /// Conversation so far, oldest first.
    pub messages: Vec<ChatMessage>,
    /// Upper bound on completion length.
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    #[serde(default)]
    pub temperature: Option<f64>,
    /// Whether the caller wants an SSE stream rather than a single JSON body.
    #[serde(default)]
    pub stream: bool,
}

impl CompletionRequest {
    /// Reject structurally invalid requests before any channel is opened.
    pub fn validate(&self) -> Result<(), String> {
        if self.model.trim().is_empty() {
            return Err("model must be non-empty".to_string());
        }
        if self.messages.is_empty() {
            return Err("messages must be non-empty".to_string());
        }
        Ok(())
    }

    /// The most recent user message, used as the reasoning pipeline's prompt.
    pub fn latest_prompt(&self) -> String {
        self.messages.last().map(|m| m.content.clone()).unwrap_or_default()
    }
}
