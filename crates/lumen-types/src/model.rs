//! Model catalog and budget configuration, process-wide state mutated only
//! through explicit add/update calls (see `DESIGN.md`, "Global mutable
//! state").

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::context::AgentId;

/// A provider/model pairing and its operating characteristics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelProfile {
    /// Provider name, e.g. `"openai"`.
    pub provider: String,
    /// Model name, e.g. `"gpt-4o"`.
    pub model: String,
    /// Relative quality score, used only in decision rationale strings.
    pub quality: f64,
    /// Relative speed score, used only in decision rationale strings.
    pub speed: f64,
    /// Cost per 1,000 tokens, in USD.
    pub cost_per_1k_tokens: f64,
    /// Maximum context window this model accepts.
    pub context_limit: u32,
    /// Requests-per-second cap enforced by the `Throttler`.
    pub max_requests_per_second: u32,
    /// Per-request timeout in milliseconds.
    pub request_timeout_ms: u64,
}

impl ModelProfile {
    /// The `"provider/model"` index key used by catalogs and throttler
    /// buckets.
    pub fn key(&self) -> String {
        format!("{}/{}", self.provider, self.model)
    }
}

/// One task type's model-selection preferences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyEntry {
    /// Estimated task complexity, used in decision rationale strings.
    pub complexity: f64,
    /// Model to try first, as `"provider/model"`.
    pub default_model: String,
    /// Model to try if `default_model` is unsuitable.
    pub fallback1: String,
    /// Model to try if `fallback1` is also unsuitable.
    pub fallback2: String,
    /// Maximum context size this task type is expected to need.
    pub max_context_size: u32,
}

/// Task-type-keyed selection strategy catalog.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ModelSelectionStrategy {
    /// Per-task-type strategy entries.
    pub strategies: HashMap<String, StrategyEntry>,
}

impl ModelSelectionStrategy {
    /// Look up the strategy for `task_type`, falling back to the
    /// `"validation"` strategy per spec §4.5 step 1.
    pub fn lookup(&self, task_type: &str) -> Option<&StrategyEntry> {
        self.strategies
            .get(task_type)
            .or_else(|| self.strategies.get("validation"))
    }
}

/// Session- and agent-scoped budget policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConstraints {
    /// Total USD the session may spend before non-critical agents fail.
    pub session_budget_usd: f64,
    /// Total USD a single agent may spend before it fails.
    pub agent_budget_usd: f64,
    /// Fraction of the budget, in `[0,1]`, at which a `warn` alert fires.
    pub warning_threshold: f64,
    /// Whether degraded (cheaper) model selection is allowed near budget.
    pub emergency_degradation_enabled: bool,
    /// Agents exempt from budget-exceeded rejection.
    pub critical_agents: BTreeSet<AgentId>,
}

impl BudgetConstraints {
    /// True if `agent_id` bypasses budget checks.
    pub fn is_critical(&self, agent_id: &str) -> bool {
        self.critical_agents.contains(agent_id)
    }
}
