//! Static pipeline configuration, loaded from YAML at startup.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::context::AgentId;

/// Execution mode for a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Run agents one at a time in declared order.
    Sequential,
    /// Run agents concurrently within dependency-levelized waves.
    Parallel,
    /// Run agents in declared order, each gated by its `conditions`.
    Conditional,
}

/// Static per-agent configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Unique, non-empty identifier within the pipeline.
    pub id: AgentId,
    /// Whether this agent is scheduled at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Agent IDs that must complete before this one may start (Parallel mode).
    #[serde(default)]
    pub depends_on: BTreeSet<AgentId>,
    /// Per-attempt timeout in milliseconds, must be `> 0`.
    pub timeout_ms: u64,
    /// Number of retry attempts after an initial failure.
    #[serde(default)]
    pub retry: u32,
    /// Dotted key paths evaluated, as a conjunction, in Conditional mode to
    /// decide whether the agent runs at all. Ignored in Sequential/Parallel
    /// mode, where preconditions instead come from the `Agent` itself.
    #[serde(default)]
    pub conditions: Vec<String>,
}

fn default_true() -> bool {
    true
}

/// Caller-tunable knobs for one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOptions {
    /// Whether to run `ValidatePreconditions`/`ValidatePostconditions`.
    pub validate_contract: bool,
    /// Whether to populate `Diagnostics.Performance`.
    pub track_performance: bool,
    /// Whether to instantiate a `DiffTracker` per agent.
    pub capture_changes: bool,
    /// Whether a contract violation aborts the run (`true`) or is
    /// downgraded to a `Warning` (`false`).
    pub fail_on_violation: bool,
    /// Global pipeline timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            validate_contract: true,
            track_performance: true,
            capture_changes: true,
            fail_on_violation: true,
            timeout_ms: 60_000,
        }
    }
}

/// Static pipeline configuration: execution mode, agent list, and options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Execution strategy for this pipeline.
    pub mode: ExecutionMode,
    /// Agents in declared order.
    pub agents: Vec<AgentConfig>,
    /// Global options applied to every scheduled agent.
    #[serde(default)]
    pub options: PipelineOptions,
}

impl PipelineConfig {
    /// Validate structural invariants: unique non-empty IDs, positive
    /// timeouts, and an acyclic `depends_on` graph over enabled agents.
    pub fn validate(&self) -> Result<(), String> {
        let mut seen = BTreeSet::new();
        for agent in &self.agents {
            if agent.id.trim().is_empty() {
                return Err("agent id must be non-empty".to_string());
            }
            if !seen.insert(agent.id.clone()) {
                return Err(format!("duplicate agent id: {}", agent.id));
            }
            if agent.timeout_ms == 0 {
                return Err(format!("agent {} has non-positive timeout", agent.id));
            }
            for dep in &agent.depends_on {
                if !self.agents.iter().any(|a| &a.id == dep) {
                    return Err(format!(
                        "agent {} depends on unknown agent {}",
                        agent.id, dep
                    ));
                }
            }
        }
        self.detect_cycle()
    }

    fn detect_cycle(&self) -> Result<(), String> {
        use std::collections::HashMap;

        #[derive(PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }

        let enabled: HashMap<&str, &AgentConfig> = self
            .agents
            .iter()
            .filter(|a| a.enabled)
            .map(|a| (a.id.as_str(), a))
            .collect();

        let mut marks: HashMap<&str, Mark> = HashMap::new();

        fn visit<'a>(
            id: &'a str,
            enabled: &HashMap<&'a str, &'a AgentConfig>,
            marks: &mut HashMap<&'a str, Mark>,
        ) -> Result<(), String> {
            match marks.get(id) {
                Some(Mark::Done) => return Ok(()),
                Some(Mark::Visiting) => return Err(format!("cycle detected at agent {id}")),
                None => {}
            }
            marks.insert(id, Mark::Visiting);
            if let Some(agent) = enabled.get(id) {
                for dep in &agent.depends_on {
                    if enabled.contains_key(dep.as_str()) {
                        visit(dep, enabled, marks)?;
                    }
                }
            }
            marks.insert(id, Mark::Done);
            Ok(())
        }

        for id in enabled.keys() {
            visit(id, &enabled, &mut marks)?;
        }
        Ok(())
    }
}
