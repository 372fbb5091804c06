#![forbid(unsafe_code)]

//! **lumen-server** – OpenAI-compatible HTTP surface for the Lumen
//! reasoning-pipeline proxy.
//!
//! Wires `lumen-scheduler`'s `ReasoningManager`, `lumen-llm`'s
//! `LlmOrchestrator`, and `lumen-stream`'s `StreamingOrchestrator` behind
//! `POST /v1/chat/completions`, `GET /health`, and `GET /workflows`.
//!
//! Concrete reasoning-agent implementations and LLM provider clients are
//! external collaborators this service does not ship (see `DESIGN.md`); the
//! default configuration runs an empty (pass-through) pipeline against
//! `lumen_llm::EchoProvider` so the binary is runnable end-to-end out of the
//! box.

mod config;
mod dto;

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use clap::Parser;
use futures::StreamExt;
use lumen_llm::{EchoProvider, LlmOrchestrator, LlmProvider};
use lumen_metrics::{AlertManager, AlertThresholds, SessionCollector};
use lumen_scheduler::ReasoningManager;
use lumen_stream::{CompletionRequest, StreamEvent, StreamingOrchestrator, WorkflowRegistry};
use lumen_types::ModelProfile;
use tokio::signal;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ServerConfig;
use crate::dto::{
    Choice, ChunkChoice, ChunkDelta, CompletionChunk, CompletionResponse, ErrorResponse, HealthResponse,
    ResponseMessage, WorkflowsResponse,
};

#[derive(Parser)]
#[command(name = "lumen-server")]
#[command(about = "Lumen reasoning-pipeline proxy HTTP surface")]
#[command(version)]
struct Cli {
    /// Pipeline/model configuration file path.
    #[arg(long, default_value = "config/pipeline.yaml")]
    config: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Clone)]
struct AppState {
    streaming: Arc<StreamingOrchestrator>,
    workflows: Arc<WorkflowRegistry>,
    metrics: Arc<SessionCollector>,
    alerts: Arc<AlertManager>,
    model_profiles: Arc<Vec<ModelProfile>>,
    budget: lumen_types::BudgetConstraints,
    started_at: std::time::Instant,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    info!("starting lumen-server v{}", env!("CARGO_PKG_VERSION"));

    let server_config = ServerConfig::load(&cli.config).with_context(|| format!("failed to load {}", cli.config))?;
    info!(workflows = server_config.workflows.len(), "loaded pipeline configuration");

    let mut managers: HashMap<String, Arc<ReasoningManager>> = HashMap::with_capacity(server_config.workflows.len());
    for (name, pipeline) in server_config.workflows {
        let manager = ReasoningManager::new(pipeline).with_context(|| format!("invalid pipeline for workflow '{name}'"))?;
        managers.insert(name, Arc::new(manager));
    }
    let workflows = Arc::new(WorkflowRegistry::new(managers, server_config.default_workflow)?);

    let model_profiles = Arc::new(server_config.model_profiles.clone());
    let budget = server_config.budget.clone();

    let _llm = Arc::new(LlmOrchestrator::new(
        server_config.model_profiles,
        server_config.strategies,
        server_config.budget,
        server_config.cache_max_size_mb as usize,
    ));

    let mut providers: HashMap<String, Arc<dyn LlmProvider>> = HashMap::new();
    providers.insert("ollama".to_string(), Arc::new(EchoProvider::new("ollama")));
    let streaming = Arc::new(StreamingOrchestrator::new(workflows.clone(), providers));

    let metrics = Arc::new(SessionCollector::new());
    let alerts = Arc::new(AlertManager::new(AlertThresholds::default()));

    let state = AppState {
        streaming,
        workflows,
        metrics,
        alerts,
        model_profiles,
        budget,
        started_at: std::time::Instant::now(),
    };
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", server_config.port))
        .await
        .with_context(|| format!("failed to bind to port {}", server_config.port))?;
    info!(port = server_config.port, "http server listening");

    tokio::select! {
        result = axum::serve(listener, app) => {
            if let Err(err) = result {
                error!(error = %err, "http server error");
            }
        }
        _ = shutdown_signal() => {
            info!("received shutdown signal");
        }
    }

    info!("lumen-server stopped");
    Ok(())
}

fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/v1/chat/completions", post(chat_completions))
        .route("/health", get(health))
        .route("/workflows", get(list_workflows))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn list_workflows(State(state): State<AppState>) -> Json<WorkflowsResponse> {
    Json(WorkflowsResponse {
        workflows: state.workflows.names(),
        default_workflow: state.workflows.default_workflow().to_string(),
    })
}

async fn chat_completions(State(state): State<AppState>, headers: HeaderMap, Json(request): Json<CompletionRequest>) -> Response {
    if let Err(message) = request.validate() {
        return bad_request(message);
    }

    let workflow = headers.get("x-workflow").and_then(|v| v.to_str().ok()).map(|s| s.to_string());
    let cancel = CancellationToken::new();
    let model = request.model.clone();
    let streaming_mode = request.stream;
    let prompt_tokens = estimate_tokens(&request);
    let provider = lumen_stream::select_provider(&model).to_string();

    let rx = match state.streaming.run(request, workflow.as_deref(), cancel).await {
        Ok(rx) => rx,
        Err(err) => return bad_request(err.to_string()),
    };

    let cost_usd = prompt_tokens as f64 / 1000.0 * cost_per_1k(&state.model_profiles, &model);
    state.metrics.record_call(&provider, &model, prompt_tokens, cost_usd);
    record_alerts(&state).await;

    if streaming_mode {
        stream_response(rx, model)
    } else {
        buffered_response(rx, model).await
    }
}

/// Rough prompt token estimate (whitespace-split word count) used only for
/// the server's own cost/budget bookkeeping; `EchoProvider` has no tokenizer.
fn estimate_tokens(request: &CompletionRequest) -> u64 {
    request.messages.iter().map(|m| m.content.split_whitespace().count() as u64).sum()
}

fn cost_per_1k(profiles: &[ModelProfile], model: &str) -> f64 {
    profiles.iter().find(|p| p.model == model).map(|p| p.cost_per_1k_tokens).unwrap_or(0.0)
}

async fn record_alerts(state: &AppState) {
    let elapsed_ms = state.started_at.elapsed().as_millis() as u64;
    let fired = state.alerts.check(&state.metrics, &state.budget, elapsed_ms).await;
    for alert in fired {
        warn!(alert.id = %alert.id, alert.message = %alert.message, "alert fired");
    }
}

fn stream_response(rx: tokio::sync::mpsc::Receiver<StreamEvent>, model: String) -> Response {
    let id = format!("chatcmpl-{}", uuid::Uuid::new_v4());
    let created = chrono::Utc::now().timestamp();

    let stream = ReceiverStream::new(rx).map(move |event| Ok::<Event, Infallible>(to_sse_event(event, &id, &model, created)));

    let mut response = Sse::new(stream).into_response();
    response.headers_mut().insert(HeaderName::from_static("cache-control"), HeaderValue::from_static("no-cache"));
    response.headers_mut().insert(HeaderName::from_static("x-accel-buffering"), HeaderValue::from_static("no"));
    response
}

fn to_sse_event(event: StreamEvent, id: &str, model: &str, created: i64) -> Event {
    match event {
        StreamEvent::Reasoning { summary, .. } => {
            chunk_event(id, model, created, Some("assistant"), format!("<reasoning>{summary}</reasoning>"))
        }
        StreamEvent::Completion { delta } => chunk_event(id, model, created, None, delta),
        StreamEvent::Done => Event::default().data("[DONE]"),
        StreamEvent::Error { message } => Event::default().comment(format!("error: {message}")),
    }
}

fn chunk_event(id: &str, model: &str, created: i64, role: Option<&'static str>, content: String) -> Event {
    let chunk = CompletionChunk {
        id: id.to_string(),
        object: "chat.completion.chunk",
        created,
        model: model.to_string(),
        choices: vec![ChunkChoice { index: 0, delta: ChunkDelta { role, content }, finish_reason: None }],
    };
    Event::default().data(serde_json::to_string(&chunk).unwrap_or_default())
}

async fn buffered_response(mut rx: tokio::sync::mpsc::Receiver<StreamEvent>, model: String) -> Response {
    let mut content = String::new();
    while let Some(event) = rx.recv().await {
        match event {
            StreamEvent::Completion { delta } => content.push_str(&delta),
            StreamEvent::Error { message } => return internal_error(message),
            StreamEvent::Reasoning { .. } | StreamEvent::Done => {}
        }
    }

    let response = CompletionResponse {
        id: format!("chatcmpl-{}", uuid::Uuid::new_v4()),
        object: "chat.completion",
        created: chrono::Utc::now().timestamp(),
        model,
        choices: vec![Choice { index: 0, message: ResponseMessage { role: "assistant", content }, finish_reason: "stop" }],
    };
    Json(response).into_response()
}

fn bad_request(message: impl Into<String>) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse { error: message.into() })).into_response()
}

fn internal_error(message: impl Into<String>) -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse { error: message.into() })).into_response()
}

fn init_logging(log_level: &str) -> Result<()> {
    let filter = format!(
        "lumen_server={level},lumen_stream={level},lumen_scheduler={level},lumen_llm={level},lumen_context={level}",
        level = log_level
    );
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer())
        .init();
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
