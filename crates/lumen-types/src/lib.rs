#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **lumen-types** – Shared data model for the Lumen reasoning-pipeline
//! proxy.
//!
//! Dependency-light and leaf-most in the workspace graph so every other
//! Lumen crate can depend on it without causing cycles. Makes no
//! assumptions about I/O, locking, or providers.

/// Cache entry and token-bucket value types.
pub mod cache;
/// Static pipeline/agent configuration types.
pub mod config;
/// The shared `AgentContext` and its subtrees.
pub mod context;
/// Error kinds shared across the core.
pub mod error;
/// Model catalog and budget types.
pub mod model;

pub use cache::{CacheEntry, TaskClass, TokenBucket};
pub use config::{AgentConfig, ExecutionMode, PipelineConfig, PipelineOptions};
pub use context::{
    AgentContext, AgentId, AgentMetric, AgentRun, AgentRunStatus, Alternative, Audit, Change,
    Conclusion, ContextDiff, Decision, Diagnostics, Enrichment, Fact, Hypothesis, InferenceStep,
    Intent, LlmSection, Performance, Reasoning, Relationship, Retrieval, RetrievalPlan, Usage,
    ValidationPhase, ValidationReport, Warning,
};
pub use error::LumenError;
pub use model::{BudgetConstraints, ModelProfile, ModelSelectionStrategy, StrategyEntry};
