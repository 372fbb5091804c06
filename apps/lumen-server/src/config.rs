//! YAML configuration loading for the server binary.
//!
//! Configuration loading is named as an external collaborator in the core
//! pipeline's contract (it never lives in `lumen-types`/`lumen-scheduler`);
//! this module is that collaborator, grounded on the teacher's
//! `OrchestrationConfig::from_file` pattern.

use std::collections::HashMap;
use std::fs;

use anyhow::{Context, Result};
use lumen_types::{
    AgentConfig, BudgetConstraints, ExecutionMode, ModelProfile, ModelSelectionStrategy, PipelineConfig,
    PipelineOptions,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct RawAgentConfig {
    id: String,
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(default)]
    depends_on: Vec<String>,
    timeout: String,
    #[serde(default)]
    retry: u32,
    #[serde(default)]
    conditions: Vec<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct RawPipelineOptions {
    #[serde(default = "default_true")]
    validate_contract: bool,
    #[serde(default = "default_true")]
    track_performance: bool,
    #[serde(default = "default_true")]
    capture_changes: bool,
    #[serde(default = "default_true")]
    fail_on_violation: bool,
    #[serde(default = "default_pipeline_timeout")]
    timeout: String,
}

fn default_pipeline_timeout() -> String {
    "60s".to_string()
}

impl Default for RawPipelineOptions {
    fn default() -> Self {
        Self {
            validate_contract: true,
            track_performance: true,
            capture_changes: true,
            fail_on_violation: true,
            timeout: default_pipeline_timeout(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawWorkflow {
    mode: ExecutionMode,
    agents: Vec<RawAgentConfig>,
    #[serde(default)]
    options: RawPipelineOptions,
}

#[derive(Debug, Deserialize)]
struct RawServerConfig {
    workflows: HashMap<String, RawWorkflow>,
    default_workflow: String,
    #[serde(default)]
    model_profiles: Vec<ModelProfile>,
    #[serde(default)]
    strategies: ModelSelectionStrategy,
    budget: BudgetConstraints,
    #[serde(default = "default_cache_size_mb")]
    cache_max_size_mb: u64,
    #[serde(default = "default_port")]
    port: u16,
}

fn default_cache_size_mb() -> u64 {
    64
}

fn default_port() -> u16 {
    8080
}

/// Fully parsed server configuration: one `PipelineConfig` per named
/// workflow plus the LLM orchestrator's model profiles/strategy/budget.
pub struct ServerConfig {
    /// Pipeline definitions keyed by workflow name.
    pub workflows: HashMap<String, PipelineConfig>,
    /// Workflow used when the caller's `X-Workflow` header is absent.
    pub default_workflow: String,
    /// Model profiles available for selection.
    pub model_profiles: Vec<ModelProfile>,
    /// Per-task-type model selection strategy.
    pub strategies: ModelSelectionStrategy,
    /// Session/agent budget constraints.
    pub budget: BudgetConstraints,
    /// Response cache size cap, in megabytes.
    pub cache_max_size_mb: u64,
    /// HTTP listen port.
    pub port: u16,
}

/// Parse `"<number><unit>"` durations (`"5s"`, `"250ms"`, `"1m"`) into
/// milliseconds, per spec §6's pipeline YAML grammar.
fn parse_duration_ms(raw: &str) -> Result<u64> {
    let raw = raw.trim();
    let split_at = raw.find(|c: char| !c.is_ascii_digit()).context("duration has no unit suffix")?;
    let (number, unit) = raw.split_at(split_at);
    let number: u64 = number.parse().with_context(|| format!("invalid duration number in '{raw}'"))?;
    let ms = match unit {
        "ms" => number,
        "s" => number * 1_000,
        "m" => number * 60_000,
        other => anyhow::bail!("unsupported duration unit '{other}' in '{raw}'"),
    };
    Ok(ms)
}

impl ServerConfig {
    /// Load and validate server configuration from a YAML file.
    pub fn load(path: &str) -> Result<Self> {
        let text = fs::read_to_string(path).with_context(|| format!("failed to read config file {path}"))?;
        let raw: RawServerConfig = serde_yaml::from_str(&text).with_context(|| format!("failed to parse config file {path}"))?;

        if !raw.workflows.contains_key(&raw.default_workflow) {
            anyhow::bail!("default_workflow '{}' is not defined under workflows", raw.default_workflow);
        }

        let mut workflows = HashMap::with_capacity(raw.workflows.len());
        for (name, workflow) in raw.workflows {
            let mut agents = Vec::with_capacity(workflow.agents.len());
            for agent in workflow.agents {
                agents.push(AgentConfig {
                    id: agent.id,
                    enabled: agent.enabled,
                    depends_on: agent.depends_on.into_iter().collect(),
                    timeout_ms: parse_duration_ms(&agent.timeout)?,
                    retry: agent.retry,
                    conditions: agent.conditions,
                });
            }
            let options = PipelineOptions {
                validate_contract: workflow.options.validate_contract,
                track_performance: workflow.options.track_performance,
                capture_changes: workflow.options.capture_changes,
                fail_on_violation: workflow.options.fail_on_violation,
                timeout_ms: parse_duration_ms(&workflow.options.timeout)?,
            };
            let config = PipelineConfig { mode: workflow.mode, agents, options };
            config.validate().map_err(anyhow::Error::msg)?;
            workflows.insert(name, config);
        }

        Ok(ServerConfig {
            workflows,
            default_workflow: raw.default_workflow,
            model_profiles: raw.model_profiles,
            strategies: raw.strategies,
            budget: raw.budget,
            cache_max_size_mb: raw.cache_max_size_mb,
            port: raw.port,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_second_millisecond_and_minute_suffixes() {
        assert_eq!(parse_duration_ms("5s").unwrap(), 5_000);
        assert_eq!(parse_duration_ms("250ms").unwrap(), 250);
        assert_eq!(parse_duration_ms("1m").unwrap(), 60_000);
    }

    #[test]
    fn rejects_unknown_unit() {
        assert!(parse_duration_ms("5x").is_err());
    }
}
