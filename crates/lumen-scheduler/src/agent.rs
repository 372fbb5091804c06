//! The `Agent` external-collaborator contract (spec §9 "Dynamic dispatch of
//! agents"). Concrete reasoning agents are implemented outside this crate;
//! the scheduler only ever holds `Arc<dyn Agent>` values.

use std::time::Duration;

use async_trait::async_trait;
use lumen_types::{AgentContext, LumenError};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Per-attempt execution context handed to `Agent::execute`: a deadline and
/// a cooperative cancellation token, both derived from the caller's request.
#[derive(Clone)]
pub struct ExecutionContext {
    /// Wall-clock instant by which this attempt must complete.
    pub deadline: Instant,
    /// Cancellation token the agent must observe at any suspension point.
    pub cancel: CancellationToken,
}

impl ExecutionContext {
    /// Time remaining until `deadline`, zero if already elapsed.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}

/// A reasoning agent: reads an `AgentContext`, performs reasoning or
/// retrieval, and returns an updated context.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Stable identifier, matching the `id` of this agent's `AgentConfig`.
    fn agent_id(&self) -> &str;

    /// Dotted key paths that must be present and non-empty before `execute`
    /// runs. Empty by default.
    fn preconditions(&self) -> Vec<String> {
        Vec::new()
    }

    /// Dotted key paths that must be present and non-empty after `execute`
    /// returns. Empty by default.
    fn postconditions(&self) -> Vec<String> {
        Vec::new()
    }

    /// Perform this agent's work, returning the mutated context.
    async fn execute(&self, exec: ExecutionContext, ctx: AgentContext) -> Result<AgentContext, LumenError>;
}
