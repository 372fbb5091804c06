//! `StreamingOrchestrator`: binds one pipeline run to a provider completion
//! stream and emits an ordered event channel (spec §4.7).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use lumen_llm::provider::{LlmProvider, ProviderRequest};
use lumen_types::{AgentContext, LumenError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::event::{StreamEvent, CHANNEL_CAPACITY};
use crate::request::{ChatMessage, CompletionRequest};
use crate::provider_select::select_provider;
use crate::workflow::WorkflowRegistry;

/// Binds inbound completion requests to a named workflow's pipeline run and
/// a provider stream.
pub struct StreamingOrchestrator {
    workflows: Arc<WorkflowRegistry>,
    providers: HashMap<String, Arc<dyn LlmProvider>>,
}

impl StreamingOrchestrator {
    /// Construct an orchestrator over `workflows` and the given provider
    /// clients, keyed by provider name (`"openai"`, `"anthropic"`,
    /// `"deepseek"`, `"ollama"`).
    pub fn new(workflows: Arc<WorkflowRegistry>, providers: HashMap<String, Arc<dyn LlmProvider>>) -> Self {
        Self { workflows, providers }
    }

    /// Step 1 of the protocol: validate the request and resolve a workflow
    /// and provider synchronously, with no channel opened on failure.
    fn prepare(
        &self,
        request: &CompletionRequest,
        workflow_name: Option<&str>,
    ) -> Result<(Arc<lumen_scheduler::ReasoningManager>, Arc<dyn LlmProvider>), LumenError> {
        request.validate().map_err(LumenError::bad_request)?;
        let (_, manager) = self.workflows.resolve(workflow_name)?;
        let provider_name = select_provider(&request.model);
        let provider = self
            .providers
            .get(provider_name)
            .cloned()
            .ok_or_else(|| LumenError::provider_unavailable(
                format!("no client registered for provider '{provider_name}'"),
                Some(request.model.clone()),
            ))?;
        Ok((manager, provider))
    }

    /// Run one completion: validate/select (step 1), then launch a producer
    /// task that emits `Reasoning`, zero or more `Completion`, and exactly
    /// one terminal `Done`/`Error` event before closing the channel.
    pub async fn run(
        &self,
        request: CompletionRequest,
        workflow_name: Option<&str>,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<StreamEvent>, LumenError> {
        let (manager, provider) = self.prepare(&request, workflow_name)?;
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

        tokio::spawn(run_producer(manager, provider, request, tx, cancel));

        Ok(rx)
    }
}

async fn run_producer(
    manager: Arc<lumen_scheduler::ReasoningManager>,
    provider: Arc<dyn LlmProvider>,
    request: CompletionRequest,
    tx: mpsc::Sender<StreamEvent>,
    cancel: CancellationToken,
) {
    if let Err(err) = drive(manager, provider, request, &tx, &cancel).await {
        warn!(error = %err, "streaming run failed");
        let _ = send(&tx, StreamEvent::Error { message: err.to_string() }, &cancel).await;
    }
    // Channel closes here regardless of exit path: `tx` is dropped.
}

async fn drive(
    manager: Arc<lumen_scheduler::ReasoningManager>,
    provider: Arc<dyn LlmProvider>,
    request: CompletionRequest,
    tx: &mpsc::Sender<StreamEvent>,
    cancel: &CancellationToken,
) -> Result<(), LumenError> {
    let session_id = uuid::Uuid::new_v4().to_string();
    let trace_id = uuid::Uuid::new_v4().to_string();
    let ctx = AgentContext::new(session_id, trace_id);

    let started = Instant::now();
    let result_ctx = manager.run(ctx, cancel.clone()).await?;
    let duration_ms = started.elapsed().as_millis() as u64;

    let summary = result_ctx
        .reasoning
        .summary
        .clone()
        .unwrap_or_else(|| format!("{} conclusion(s) reached", result_ctx.reasoning.conclusions.len()));

    let sent = send(tx, StreamEvent::Reasoning { summary, duration_ms }, cancel).await;
    if !sent {
        return Ok(());
    }

    let enriched = enriched_messages(&result_ctx);
    let prompt = compose_prompt(&enriched, &request.messages);

    let provider_request = ProviderRequest {
        prompt,
        model: request.model.clone(),
        max_tokens: request.max_tokens.unwrap_or(1024),
        temperature: request.temperature.unwrap_or(0.7) as f32,
    };

    let mut chunks = provider
        .stream_completion(provider_request)
        .await
        .map_err(|message| LumenError::provider_unavailable(message, Some(request.model.clone())))?;

    loop {
        let chunk = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(LumenError::cancelled("stream cancelled by caller"));
            }
            chunk = chunks.recv() => chunk,
        };
        let Some(chunk) = chunk else { break };

        let sent = send(tx, StreamEvent::Completion { delta: chunk.delta }, cancel).await;
        if !sent {
            return Ok(());
        }
        if chunk.is_final {
            break;
        }
    }

    let _ = send(tx, StreamEvent::Done, cancel).await;
    Ok(())
}

/// Send racing against cancellation (spec §4.7: "each send races against
/// the caller's cancellation"). Returns `false` when cancelled or the
/// receiver has gone away, in which case the producer must stop emitting.
async fn send(tx: &mpsc::Sender<StreamEvent>, event: StreamEvent, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        result = tx.send(event) => result.is_ok(),
    }
}

fn enriched_messages(ctx: &AgentContext) -> Vec<ChatMessage> {
    let mut out = Vec::new();
    if !ctx.enrichment.facts.is_empty() {
        let body = ctx.enrichment.facts.iter().map(|f| f.content.as_str()).collect::<Vec<_>>().join("\n");
        out.push(ChatMessage { role: "system".to_string(), content: body });
    }
    if !ctx.reasoning.conclusions.is_empty() {
        let body = ctx
            .reasoning
            .conclusions
            .iter()
            .map(|c| c.description.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        out.push(ChatMessage { role: "system".to_string(), content: body });
    }
    out
}

fn compose_prompt(enriched: &[ChatMessage], original: &[ChatMessage]) -> String {
    enriched
        .iter()
        .chain(original.iter())
        .map(|m| format!("{}: {}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use lumen_llm::provider::EchoProvider;
    use lumen_scheduler::ReasoningManager;
    use lumen_types::{AgentConfig, ExecutionMode, PipelineConfig, PipelineOptions};

    use super::*;
    use crate::request::ChatMessage;

    fn noop_pipeline() -> Arc<ReasoningManager> {
        let config = PipelineConfig {
            mode: ExecutionMode::Sequential,
            agents: vec![],
            options: PipelineOptions { validate_contract: false, ..PipelineOptions::default() },
        };
        Arc::new(ReasoningManager::new(config).unwrap())
    }

    fn registry() -> Arc<WorkflowRegistry> {
        let mut workflows: HashMap<String, Arc<ReasoningManager>> = HashMap::new();
        workflows.insert("default".to_string(), noop_pipeline());
        Arc::new(WorkflowRegistry::new(workflows, "default").unwrap())
    }

    fn providers() -> HashMap<String, Arc<dyn LlmProvider>> {
        let mut providers: HashMap<String, Arc<dyn LlmProvider>> = HashMap::new();
        providers.insert("ollama".to_string(), Arc::new(EchoProvider::new("ollama")));
        providers
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            model: "local-model".to_string(),
            messages: vec![ChatMessage { role: "user".to_string(), content: "hello".to_string() }],
            max_tokens: None,
            temperature: None,
            stream: true,
        }
    }

    #[tokio::test]
    async fn reasoning_event_precedes_completion_events() {
        let orchestrator = StreamingOrchestrator::new(registry(), providers());
        let mut rx = orchestrator.run(request(), None, CancellationToken::new()).await.unwrap();

        let first = rx.recv().await.unwrap();
        assert!(matches!(first, StreamEvent::Reasoning { .. }));

        let mut saw_completion = false;
        let mut saw_done = false;
        while let Some(event) = rx.recv().await {
            match event {
                StreamEvent::Completion { .. } => saw_completion = true,
                StreamEvent::Done => {
                    saw_done = true;
                    break;
                }
                StreamEvent::Error { message } => panic!("unexpected error event: {message}"),
                StreamEvent::Reasoning { .. } => panic!("reasoning event emitted twice"),
            }
        }
        assert!(saw_completion);
        assert!(saw_done);
        assert!(rx.recv().await.is_none(), "channel must close after Done");
    }

    #[tokio::test]
    async fn unknown_workflow_fails_before_opening_a_channel() {
        let orchestrator = StreamingOrchestrator::new(registry(), providers());
        let err = orchestrator.run(request(), Some("nope"), CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, LumenError::BadRequest { .. }));
    }

    #[tokio::test]
    async fn unknown_provider_prefix_fails_before_opening_a_channel() {
        let orchestrator = StreamingOrchestrator::new(registry(), HashMap::new());
        let err = orchestrator.run(request(), None, CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, LumenError::ProviderUnavailable { .. }));
    }

    #[tokio::test]
    async fn cancellation_before_send_stops_the_producer() {
        let orchestrator = StreamingOrchestrator::new(registry(), providers());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut rx = orchestrator.run(request(), None, cancel).await.unwrap();
        assert!(rx.recv().await.is_none());
    }
}
