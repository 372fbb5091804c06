//! The shared `AgentContext` carried through a pipeline run.
//!
//! Maps use `BTreeMap` rather than `HashMap` throughout this module: the
//! ordering is what makes `AgentContext::serialize` deterministic (I-2 in
//! `DESIGN.md`'s invariant table) without a separate sort step.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier for a reasoning agent, matching `AgentConfig.id`.
pub type AgentId = String;

/// The single source of truth for one pipeline run.
///
/// `Metadata.session_id` / `Metadata.trace_id` are set once at construction
/// and have no public setters, which is what keeps invariant I1 (non-empty,
/// immutable after creation) true by construction rather than by runtime
/// check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentContext {
    metadata: ContextMetadata,
    /// Reasoning subtree: intents, hypotheses, inference steps, conclusions.
    pub reasoning: Reasoning,
    /// Enrichment subtree: facts, knowledge, relationships.
    pub enrichment: Enrichment,
    /// Retrieval subtree: plans, queries, artifacts.
    pub retrieval: Retrieval,
    /// LLM subtree: provider/model in use, usage ledger, decision log.
    pub llm: LlmSection,
    /// Diagnostics subtree: errors, warnings, validation reports, perf.
    pub diagnostics: Diagnostics,
    /// Audit subtree: per-attempt agent runs and context diffs.
    pub audit: Audit,
}

impl AgentContext {
    /// Create a fresh context for a new pipeline run.
    ///
    /// `session_id` and `trace_id` must be non-empty; this is the only
    /// place invariant I1 can be violated, so we reject it here rather than
    /// pushing validation onto every reader.
    pub fn new(session_id: impl Into<String>, trace_id: impl Into<String>) -> Self {
        let session_id = session_id.into();
        let trace_id = trace_id.into();
        assert!(!session_id.is_empty(), "session_id must be non-empty");
        assert!(!trace_id.is_empty(), "trace_id must be non-empty");
        Self {
            metadata: ContextMetadata {
                session_id,
                trace_id,
                request_id: uuid::Uuid::new_v4().to_string(),
            },
            reasoning: Reasoning::default(),
            enrichment: Enrichment::default(),
            retrieval: Retrieval::default(),
            llm: LlmSection::default(),
            diagnostics: Diagnostics::default(),
            audit: Audit::default(),
        }
    }

    /// Session identifier, stable for the lifetime of the context.
    pub fn session_id(&self) -> &str {
        &self.metadata.session_id
    }

    /// Trace identifier, stable for the lifetime of the context.
    pub fn trace_id(&self) -> &str {
        &self.metadata.trace_id
    }

    /// Per-HTTP-request correlation id, threaded into tracing spans.
    pub fn request_id(&self) -> &str {
        &self.metadata.request_id
    }

    /// Deterministic canonical serialization: repeated calls on an
    /// unchanged value yield byte-equal output, with map keys in sorted
    /// order (guaranteed by `BTreeMap` throughout this struct).
    pub fn serialize(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// Request/session identity. Immutable once the context is constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ContextMetadata {
    session_id: String,
    trace_id: String,
    request_id: String,
}

/// A classified user intent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    /// Intent label, e.g. "book_flight".
    #[serde(rename = "type")]
    pub r#type: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Named entities extracted alongside this intent.
    pub entities: Vec<String>,
}

/// A candidate explanation awaiting further evidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hypothesis {
    /// Stable identifier within this run.
    pub id: String,
    /// Human-readable description.
    pub description: String,
    /// IDs of hypotheses this one depends on.
    pub dependencies: Vec<String>,
}

/// One step of chained reasoning over a hypothesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceStep {
    /// Stable identifier within this run.
    pub id: String,
    /// Hypothesis ID this step reasons about.
    pub hypothesis: String,
    /// Supporting evidence strings.
    pub evidence: Vec<String>,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
}

/// A final or intermediate conclusion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conclusion {
    /// Stable identifier within this run.
    pub id: String,
    /// Human-readable description.
    pub description: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Supporting evidence strings.
    pub evidence: Vec<String>,
    /// Intent this conclusion answers, if any.
    pub intent: Option<String>,
}

/// A rejected or lower-confidence alternative to a conclusion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alternative {
    /// Stable identifier within this run.
    pub id: String,
    /// Human-readable description.
    pub description: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
}

/// Reasoning subtree.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Reasoning {
    /// Ordered classified intents.
    pub intents: Vec<Intent>,
    /// Free-form extracted entities.
    pub entities: BTreeMap<String, serde_json::Value>,
    /// Ordered candidate hypotheses.
    pub hypotheses: Vec<Hypothesis>,
    /// Ordered inference steps.
    pub inference_steps: Vec<InferenceStep>,
    /// Ordered conclusions.
    pub conclusions: Vec<Conclusion>,
    /// Ordered rejected alternatives.
    pub alternatives: Vec<Alternative>,
    /// Named confidence scores.
    pub confidence_scores: BTreeMap<String, f64>,
    /// Free-text summary of the reasoning performed.
    pub summary: Option<String>,
    /// Opaque artifact identifiers produced during reasoning.
    pub artifacts: Vec<String>,
}

/// A piece of retrieved or derived knowledge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fact {
    /// Stable identifier within this run.
    pub id: String,
    /// Fact content.
    pub content: String,
    /// Where the fact came from.
    pub source: String,
    /// When the fact was recorded.
    pub timestamp: DateTime<Utc>,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Free-form provenance chain.
    pub provenance: Vec<String>,
}

/// A relation between two entities or facts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    /// Subject of the relation.
    pub subject: String,
    /// Relation predicate.
    pub predicate: String,
    /// Object of the relation.
    pub object: String,
}

/// Enrichment subtree.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Enrichment {
    /// Ordered facts gathered during enrichment.
    pub facts: Vec<Fact>,
    /// Free-form derived knowledge.
    pub knowledge: BTreeMap<String, serde_json::Value>,
    /// Relations discovered between entities/facts.
    pub relationships: Vec<Relationship>,
}

/// A planned retrieval operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalPlan {
    /// Stable identifier within this run.
    pub id: String,
    /// Human-readable description.
    pub description: String,
    /// Sources to retrieve from.
    pub sources: Vec<String>,
    /// Filters applied to the retrieval.
    pub filters: BTreeMap<String, String>,
    /// Relative priority, lower runs first.
    pub priority: i32,
}

/// Retrieval subtree.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Retrieval {
    /// Ordered retrieval plans.
    pub plans: Vec<RetrievalPlan>,
    /// Queries issued against retrieval sources.
    pub queries: Vec<String>,
    /// Artifacts returned by retrieval.
    pub artifacts: Vec<String>,
}

/// Token and cost usage, both session-wide and per-agent.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Usage {
    /// Total tokens across prompt and completion.
    pub total_tokens: u64,
    /// Prompt-side token count.
    pub prompt_tokens: u64,
    /// Completion-side token count.
    pub completion_tokens: u64,
    /// Total cost in USD.
    pub cost_usd: f64,
    /// Token totals broken down by agent.
    pub by_agent: BTreeMap<AgentId, u64>,
    /// Cost totals broken down by agent.
    pub cost_by_agent: BTreeMap<AgentId, f64>,
}

/// A recorded model-selection decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    /// When the decision was made.
    pub timestamp: DateTime<Utc>,
    /// Agent the decision was made for.
    pub agent_id: AgentId,
    /// Task type the decision was made for.
    pub task_type: String,
    /// The model that was selected, as `"provider/model"`.
    pub selected: String,
    /// Human-readable rationale, including cost/quality/speed.
    pub reason: String,
    /// Estimated task complexity driving the decision.
    pub complexity: f64,
}

/// LLM subtree.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmSection {
    /// Provider currently in use for this run, if selected.
    pub provider: Option<String>,
    /// Model currently in use for this run, if selected.
    pub model: Option<String>,
    /// Accumulated usage for this run.
    pub usage: Usage,
    /// Ordered model-selection decisions.
    pub decisions: Vec<Decision>,
    /// Whether a given cache key was served from cache.
    pub cache_annotations: BTreeMap<String, bool>,
}

/// An error surfaced during pipeline execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    /// When the error was recorded.
    pub timestamp: DateTime<Utc>,
    /// Human-readable message.
    pub message: String,
    /// Agent that produced the error, if any.
    pub agent_id: Option<AgentId>,
}

/// A non-fatal warning surfaced during pipeline execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Warning {
    /// When the warning was recorded.
    pub timestamp: DateTime<Utc>,
    /// Human-readable message.
    pub message: String,
    /// Agent that produced the warning, if any.
    pub agent_id: Option<AgentId>,
}

/// The outcome of a contract validation check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Agent the report concerns.
    pub agent_id: AgentId,
    /// Which phase was validated.
    pub phase: ValidationPhase,
    /// Whether validation passed.
    pub valid: bool,
    /// Human-readable detail.
    pub message: String,
}

/// Which half of an agent's contract was being checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationPhase {
    /// Precondition check, run before `Execute`.
    Precondition,
    /// Postcondition check, run after `Execute`.
    Postcondition,
}

/// Per-agent performance counters.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AgentMetric {
    /// Wall-clock duration of the attempt.
    pub duration_ms: u64,
    /// Number of LLM calls made during the attempt.
    pub llm_calls: u64,
    /// Tokens consumed during the attempt.
    pub tokens: u64,
    /// Cost in USD incurred during the attempt.
    pub cost: f64,
    /// Final status string, e.g. `"success"` / `"failed"`.
    pub status: String,
    /// Resident memory delta observed for the attempt, in KiB.
    pub memory_delta_kb: i64,
}

/// Performance subtree.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Performance {
    /// Wall time from scheduler entry to exit (I3).
    pub total_duration_ms: u64,
    /// Per-agent performance counters.
    pub agent_metrics: BTreeMap<AgentId, AgentMetric>,
}

/// Diagnostics subtree.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Diagnostics {
    /// Ordered error reports.
    pub errors: Vec<ErrorReport>,
    /// Ordered warnings.
    pub warnings: Vec<Warning>,
    /// Ordered validation reports.
    pub validation_reports: Vec<ValidationReport>,
    /// Aggregate and per-agent performance counters.
    pub performance: Performance,
}

/// Outcome of one scheduled attempt at running an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRunStatus {
    /// The attempt completed without error.
    Success,
    /// The attempt returned an error.
    Failed,
}

/// One scheduled attempt at running an agent (I2: one entry per attempt).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRun {
    /// When the attempt was recorded.
    pub timestamp: DateTime<Utc>,
    /// Agent the attempt belongs to.
    pub agent_id: AgentId,
    /// Outcome of the attempt.
    pub status: AgentRunStatus,
    /// Wall-clock duration of the attempt.
    pub duration_ms: u64,
    /// Context key paths written during the attempt.
    pub keys_written: Vec<String>,
    /// Error message, present iff `status == Failed`.
    pub error: Option<String>,
}

/// A single structural change captured by the `DiffTracker`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Change {
    /// A key path that was absent pre-execution and present post-execution.
    Added {
        /// Dotted key path.
        path: String,
    },
    /// A key path whose value differed pre- versus post-execution.
    Changed {
        /// Dotted key path.
        path: String,
    },
    /// A key path that was present pre-execution and absent post-execution.
    Removed {
        /// Dotted key path.
        path: String,
    },
}

/// The structural delta between a context snapshot and a post-execution
/// context, attributed to one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextDiff {
    /// When the diff was captured.
    pub timestamp: DateTime<Utc>,
    /// Agent the diff is attributed to.
    pub agent_id: AgentId,
    /// Enumerated structural changes. Empty iff the agent mutated nothing.
    pub changes: Vec<Change>,
}

/// Audit subtree.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Audit {
    /// Ordered record of every scheduled agent attempt.
    pub agent_runs: Vec<AgentRun>,
    /// Ordered record of every captured context diff.
    pub diffs: Vec<ContextDiff>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_is_deep_independent() {
        let mut ctx = AgentContext::new("sess-1", "trace-1");
        ctx.reasoning.intents.push(Intent {
            r#type: "book_flight".into(),
            confidence: 0.9,
            entities: vec!["SFO".into()],
        });
        let clone = ctx.clone();
        ctx.reasoning.intents[0].confidence = 0.1;
        assert_eq!(clone.reasoning.intents[0].confidence, 0.9);
    }

    #[test]
    fn serialize_is_deterministic() {
        let mut ctx = AgentContext::new("sess-1", "trace-1");
        ctx.enrichment.knowledge.insert("b".into(), serde_json::json!(1));
        ctx.enrichment.knowledge.insert("a".into(), serde_json::json!(2));
        let first = ctx.serialize().unwrap();
        let second = ctx.serialize().unwrap();
        assert_eq!(first, second);
        let text = String::from_utf8(first).unwrap();
        assert!(text.find("\"a\"").unwrap() < text.find("\"b\"").unwrap());
    }

    #[test]
    fn metadata_survives_round_trip() {
        let ctx = AgentContext::new("sess-1", "trace-1");
        let bytes = ctx.serialize().unwrap();
        let decoded: AgentContext = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(decoded.session_id(), "sess-1");
        assert_eq!(decoded.trace_id(), "trace-1");
    }
}
