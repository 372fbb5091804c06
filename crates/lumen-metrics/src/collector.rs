//! Per-session cost and performance collectors (spec §4.8).
//!
//! Each aggregate lives behind its own lock/concurrent map, mirroring the
//! per-concern locking discipline the rest of the pipeline uses rather than
//! one big mutex over the whole session.

use std::collections::HashMap;

use dashmap::DashMap;
use lumen_types::Decision;
use tokio::sync::RwLock;

/// Running min/max/avg/error statistics for one agent.
#[derive(Debug, Clone, Default)]
pub struct AgentStats {
    /// Number of completed executions (success or failure) observed.
    pub count: u64,
    /// Fastest observed duration.
    pub min_ms: u64,
    /// Slowest observed duration.
    pub max_ms: u64,
    /// Sum of observed durations, for computing the average.
    pub total_ms: u64,
    /// Number of executions that ended in error.
    pub error_count: u64,
    /// Sum of observed memory deltas, for computing the average.
    pub total_memory_delta_kb: i64,
}

impl AgentStats {
    /// Mean duration across every observed execution.
    pub fn avg_ms(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total_ms as f64 / self.count as f64
        }
    }

    /// Mean memory delta across every observed execution, in MiB.
    pub fn avg_memory_delta_mib(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            (self.total_memory_delta_kb as f64 / self.count as f64) / 1024.0
        }
    }

    /// Fraction of executions that errored, in `[0, 1]`.
    pub fn error_rate(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.error_count as f64 / self.count as f64
        }
    }

    fn record(&mut self, duration_ms: u64, memory_delta_kb: i64, errored: bool) {
        self.count += 1;
        self.total_ms += duration_ms;
        self.total_memory_delta_kb += memory_delta_kb;
        self.min_ms = if self.count == 1 { duration_ms } else { self.min_ms.min(duration_ms) };
        self.max_ms = self.max_ms.max(duration_ms);
        if errored {
            self.error_count += 1;
        }
    }
}

/// Aggregates one pipeline/LLM session's cost, call volume, and per-agent
/// performance. Cheap to share behind an `Arc`: every field is internally
/// synchronized.
#[derive(Default)]
pub struct SessionCollector {
    call_counts: DashMap<String, u64>,
    token_totals: DashMap<String, u64>,
    cost_totals: DashMap<String, f64>,
    agent_stats: DashMap<String, AgentStats>,
    decisions: RwLock<Vec<Decision>>,
}

fn provider_model_key(provider: &str, model: &str) -> String {
    format!("{provider}/{model}")
}

impl SessionCollector {
    /// Construct an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed LLM call against `provider`/`model`.
    pub fn record_call(&self, provider: &str, model: &str, tokens: u64, cost_usd: f64) {
        let key = provider_model_key(provider, model);
        *self.call_counts.entry(key.clone()).or_insert(0) += 1;
        *self.token_totals.entry(key.clone()).or_insert(0) += tokens;
        *self.cost_totals.entry(key).or_insert(0.0) += cost_usd;
    }

    /// Total cost recorded across every provider/model this session.
    pub fn total_cost_usd(&self) -> f64 {
        self.cost_totals.iter().map(|entry| *entry.value()).sum()
    }

    /// Snapshot of call counts, keyed `"provider/model"`.
    pub fn call_counts(&self) -> HashMap<String, u64> {
        self.call_counts.iter().map(|e| (e.key().clone(), *e.value())).collect()
    }

    /// Snapshot of token totals, keyed `"provider/model"`.
    pub fn token_totals(&self) -> HashMap<String, u64> {
        self.token_totals.iter().map(|e| (e.key().clone(), *e.value())).collect()
    }

    /// Record one completed agent execution's duration, memory delta, and
    /// success/failure outcome.
    pub fn record_agent_execution(&self, agent_id: &str, duration_ms: u64, memory_delta_kb: i64, errored: bool) {
        self.agent_stats.entry(agent_id.to_string()).or_default().record(duration_ms, memory_delta_kb, errored);
    }

    /// Snapshot of per-agent statistics, keyed by agent ID.
    pub fn agent_stats(&self) -> HashMap<String, AgentStats> {
        self.agent_stats.iter().map(|e| (e.key().clone(), e.value().clone())).collect()
    }

    /// Append a model-selection decision to this session's decision log.
    pub async fn record_decision(&self, decision: Decision) {
        self.decisions.write().await.push(decision);
    }

    /// Snapshot of every model-selection decision recorded this session.
    pub async fn decisions(&self) -> Vec<Decision> {
        self.decisions.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_calls_and_totals_per_provider_model() {
        let collector = SessionCollector::new();
        collector.record_call("openai", "gpt-4o", 100, 0.02);
        collector.record_call("openai", "gpt-4o", 50, 0.01);

        assert_eq!(collector.call_counts()["openai/gpt-4o"], 2);
        assert_eq!(collector.token_totals()["openai/gpt-4o"], 150);
        assert!((collector.total_cost_usd() - 0.03).abs() < 1e-9);
    }

    #[test]
    fn agent_stats_track_min_max_avg_and_errors() {
        let collector = SessionCollector::new();
        collector.record_agent_execution("classifier", 100, 10, false);
        collector.record_agent_execution("classifier", 300, 20, true);

        let stats = &collector.agent_stats()["classifier"];
        assert_eq!(stats.min_ms, 100);
        assert_eq!(stats.max_ms, 300);
        assert_eq!(stats.avg_ms(), 200.0);
        assert_eq!(stats.error_count, 1);
        assert!((stats.error_rate() - 0.5).abs() < 1e-9);
    }
}
