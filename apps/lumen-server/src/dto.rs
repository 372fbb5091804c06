//! OpenAI-compatible response bodies (spec §6).

use serde::Serialize;

/// Non-streaming `chat.completion` response.
#[derive(Debug, Serialize)]
pub struct CompletionResponse {
    pub id: String,
    pub object: &'static str,
    pub created: i64,
    pub model: String,
    pub choices: Vec<Choice>,
}

#[derive(Debug, Serialize)]
pub struct Choice {
    pub index: u32,
    pub message: ResponseMessage,
    pub finish_reason: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ResponseMessage {
    pub role: &'static str,
    pub content: String,
}

/// One `chat.completion.chunk` frame, used for both the reasoning preamble
/// and each forwarded provider delta.
#[derive(Debug, Serialize)]
pub struct CompletionChunk {
    pub id: String,
    pub object: &'static str,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChunkChoice>,
}

#[derive(Debug, Serialize)]
pub struct ChunkChoice {
    pub index: u32,
    pub delta: ChunkDelta,
    pub finish_reason: Option<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct ChunkDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<&'static str>,
    pub content: String,
}

/// `GET /health` body.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// `GET /workflows` body.
#[derive(Debug, Serialize)]
pub struct WorkflowsResponse {
    pub workflows: Vec<String>,
    pub default_workflow: String,
}

/// `{"error": "..."}` body for 400/500 responses.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
