//! Sequential mode: agents run one at a time in declared order.

use std::collections::HashMap;
use std::sync::Arc;

use lumen_types::{AgentConfig, AgentContext, LumenError, PipelineOptions};
use tokio_util::sync::CancellationToken;

use crate::agent::Agent;
use crate::executor::execute_agent;

/// Run `agents` in declared order against `ctx`, skipping disabled agents
/// and propagating the returned context to the next agent. Stops and
/// returns the partial context plus error on the first agent failure.
pub async fn run(
    agents: &[AgentConfig],
    agent_impls: &HashMap<String, Arc<dyn Agent>>,
    mut ctx: AgentContext,
    options: &PipelineOptions,
    cancel: &CancellationToken,
) -> Result<AgentContext, LumenError> {
    for cfg in agents {
        if !cfg.enabled {
            continue;
        }
        if cancel.is_cancelled() {
            return Err(LumenError::cancelled(format!("cancelled before agent {}", cfg.id)));
        }
        let agent = agent_impls
            .get(&cfg.id)
            .ok_or_else(|| LumenError::bad_request(format!("no agent registered for id {}", cfg.id)))?;
        ctx = execute_agent(agent.as_ref(), ctx, cfg, options, cancel).await?;
    }
    Ok(ctx)
}
