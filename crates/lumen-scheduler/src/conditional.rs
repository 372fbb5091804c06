//! Conditional mode: each enabled agent is gated by a conjunction of
//! precondition-style key-presence checks over `AgentConfig.conditions`.

use std::collections::HashMap;
use std::sync::Arc;

use lumen_context::ContractValidator;
use lumen_types::{AgentConfig, AgentContext, LumenError, PipelineOptions};
use tokio_util::sync::CancellationToken;

use crate::agent::Agent;
use crate::executor::execute_agent;

/// Run `agents` in declared order, skipping (silently, with no `AgentRun`
/// appended) any enabled agent whose `conditions` do not all hold against
/// the current context. An empty condition list always executes.
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
        if !cfg.conditions.is_empty() {
            let outcome = ContractValidator::validate_preconditions(&ctx, &cfg.conditions);
            if !outcome.valid {
                continue;
            }
        }
        let agent = agent_impls
            .get(&cfg.id)
            .ok_or_else(|| LumenError::bad_request(format!("no agent registered for id {}", cfg.id)))?;
        ctx = execute_agent(agent.as_ref(), ctx, cfg, options, cancel).await?;
    }
    Ok(ctx)
}
