//! The `LlmProvider` contract. Concrete provider clients (OpenAI, Anthropic,
//! local/Ollama, …) are external collaborators per spec §1 and are not
//! shipped from this crate; only the trait and a deterministic test double
//! live here.

use async_trait::async_trait;

/// One streamed chunk of a provider completion.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Text delta carried by this chunk.
    pub delta: String,
    /// True on the final chunk of the stream.
    pub is_final: bool,
}

/// A single completion request sent to a provider.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    /// Fully composed prompt (system + enriched + user messages flattened).
    pub prompt: String,
    /// Model name to invoke.
    pub model: String,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
}

/// External LLM provider contract: stream a completion and report health.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name, e.g. `"openai"`.
    fn provider_name(&self) -> &str;

    /// Stream a completion for `request`, forwarding chunks on the returned
    /// channel in arrival order and closing it once the final chunk (or an
    /// error) has been sent.
    async fn stream_completion(
        &self,
        request: ProviderRequest,
    ) -> Result<tokio::sync::mpsc::Receiver<Chunk>, String>;

    /// Lightweight liveness probe.
    async fn check_health(&self) -> Result<(), String>;
}

/// A deterministic in-memory provider used by this crate's own tests and by
/// callers that want to exercise the orchestrator without a network
/// dependency.
pub struct EchoProvider {
    name: String,
}

impl EchoProvider {
    /// Construct an echo provider reporting `name` as its provider name.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl LlmProvider for EchoProvider {
    fn provider_name(&self) -> &str {
        &self.name
    }

    async fn stream_completion(
        &self,
        request: ProviderRequest,
    ) -> Result<tokio::sync::mpsc::Receiver<Chunk>, String> {
        let (tx, rx) = tokio::sync::mpsc::channel(10);
        let reply = format!("echo: {}", request.prompt);
        tokio::spawn(async move {
            let _ = tx
                .send(Chunk { delta: reply, is_final: true })
                .await;
        });
        Ok(rx)
    }

    async fn check_health(&self) -> Result<(), String> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echo_provider_streams_one_final_chunk() {
        let provider = EchoProvider::new("test");
        let mut rx = provider
            .stream_completion(ProviderRequest {
                prompt: "hi".into(),
                model: "test-model".into(),
                max_tokens: 10,
                temperature: 0.0,
            })
            .await
            .unwrap();
        let chunk = rx.recv().await.unwrap();
        assert!(chunk.is_final);
        assert_eq!(chunk.delta, "echo: hi");
        assert!(rx.recv().await.is_none());
    }
}
