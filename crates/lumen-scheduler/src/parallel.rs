//! Parallel mode: dependency-levelized topological execution.
//!
//! Within a level every agent reads the same pre-level context and runs
//! concurrently; the scheduler waits for the whole level before starting
//! the next. Merge policy across a level is last-writer-wins over the
//! shared subtrees, with append-only audit/diagnostics data concatenated
//! from every task rather than dropped (see `DESIGN.md`, Open Questions).

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use lumen_types::{AgentConfig, AgentContext, LumenError, PipelineOptions};
use tokio_util::sync::CancellationToken;

use crate::agent::Agent;
use crate::dependency::compute_levels;
use crate::executor::execute_agent;

/// Run `agents` as dependency-levelized waves against `ctx`.
pub async fn run(
    agents: &[AgentConfig],
    agent_impls: Arc<HashMap<String, Arc<dyn Agent>>>,
    mut ctx: AgentContext,
    options: PipelineOptions,
    cancel: CancellationToken,
) -> Result<AgentContext, LumenError> {
    let enabled: Vec<AgentConfig> = agents.iter().filter(|a| a.enabled).cloned().collect();
    let levels = compute_levels(&enabled)?;

    for level in levels {
        if cancel.is_cancelled() {
            return Err(LumenError::cancelled("cancelled before starting next level"));
        }

        let base_runs = ctx.audit.agent_runs.len();
        let base_diffs = ctx.audit.diffs.len();
        let base_warnings = ctx.diagnostics.warnings.len();

        let tasks = level.into_iter().map(|cfg| {
            let ctx_clone = ctx.clone();
            let agent_impls = agent_impls.clone();
            let options = options.clone();
            let cancel = cancel.clone();
            async move {
                let agent = agent_impls
                    .get(&cfg.id)
                    .ok_or_else(|| LumenError::bad_request(format!("no agent registered for id {}", cfg.id)))?;
                execute_agent(agent.as_ref(), ctx_clone, &cfg, &options, &cancel).await
            }
        });

        let results: Vec<Result<AgentContext, LumenError>> = join_all(tasks).await;

        let mut successes = Vec::with_capacity(results.len());
        for result in results {
            successes.push(result?);
        }

        if successes.is_empty() {
            continue;
        }

        ctx = merge_level(ctx, successes, base_runs, base_diffs, base_warnings);
    }

    Ok(ctx)
}

fn merge_level(
    pre: AgentContext,
    results: Vec<AgentContext>,
    base_runs: usize,
    base_diffs: usize,
    base_warnings: usize,
) -> AgentContext {
    // Last-writer-wins: the final task in declared order supplies the
    // shared-subtree baseline for the next level.
    let mut merged = results.last().cloned().expect("non-empty level");

    let mut agent_runs = pre.audit.agent_runs.clone();
    let mut diffs = pre.audit.diffs.clone();
    let mut warnings = pre.diagnostics.warnings.clone();
    let mut agent_metrics = pre.diagnostics.performance.agent_metrics.clone();

    for result in &results {
        agent_runs.extend(result.audit.agent_runs[base_runs..].iter().cloned());
        diffs.extend(result.audit.diffs[base_diffs..].iter().cloned());
        warnings.extend(result.diagnostics.warnings[base_warnings..].iter().cloned());
        for (agent_id, metric) in &result.diagnostics.performance.agent_metrics {
            agent_metrics.insert(agent_id.clone(), metric.clone());
        }
    }

    merged.audit.agent_runs = agent_runs;
    merged.audit.diffs = diffs;
    merged.diagnostics.warnings = warnings;
    merged.diagnostics.performance.agent_metrics = agent_metrics;
    merged
}
