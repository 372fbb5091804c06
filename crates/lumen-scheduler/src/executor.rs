//! The common per-agent execution step (`executeAgent`), shared by every
//! scheduling mode.

use std::time::{Duration, Instant as StdInstant};

use chrono::Utc;
use lumen_context::{ContractValidator, DiffTracker};
use lumen_types::{AgentConfig, AgentContext, AgentRun, AgentRunStatus, LumenError, PipelineOptions, Warning};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::agent::{Agent, ExecutionContext};

const RETRY_BACKOFF: Duration = Duration::from_millis(100);

/// Run one scheduled attempt sequence for `agent` against `ctx`: validate
/// preconditions, capture a diff, call `execute` with retry/timeout
/// accounting, validate postconditions, then append the audit trail.
///
/// On irrecoverable failure the returned error carries the partial context
/// (including every recorded failed attempt) via `with_partial_context`.
pub async fn execute_agent(
    agent: &dyn Agent,
    mut ctx: AgentContext,
    agent_cfg: &AgentConfig,
    options: &PipelineOptions,
    cancel: &CancellationToken,
) -> Result<AgentContext, LumenError> {
    let agent_id = agent.agent_id().to_string();

    if cancel.is_cancelled() {
        return Err(LumenError::cancelled(format!("cancelled before agent {agent_id} started")));
    }

    if options.validate_contract {
        let outcome = ContractValidator::validate_preconditions(&ctx, &agent.preconditions());
        if !outcome.valid {
            let message = outcome.error.unwrap_or_default();
            if options.fail_on_violation {
                return Err(LumenError::validation_failure(message, Some(agent_id)));
            }
            ctx.diagnostics.warnings.push(Warning {
                timestamp: Utc::now(),
                message,
                agent_id: Some(agent_id.clone()),
            });
        }
    }

    let tracker = if options.capture_changes {
        Some(DiffTracker::new(&ctx)?)
    } else {
        None
    };

    let pre_calls = ctx.llm.decisions.iter().filter(|d| d.agent_id == agent_id).count();
    let pre_tokens = ctx.llm.usage.by_agent.get(&agent_id).copied().unwrap_or(0);
    let pre_cost = ctx.llm.usage.cost_by_agent.get(&agent_id).copied().unwrap_or(0.0);

    let attempts_allowed = 1 + agent_cfg.retry;
    let mut last_error: Option<LumenError> = None;
    let mut success: Option<(AgentContext, u64)> = None;

    for attempt in 0..attempts_allowed {
        if cancel.is_cancelled() {
            return Err(LumenError::cancelled(format!("cancelled during agent {agent_id}")));
        }

        let deadline = Instant::now() + Duration::from_millis(agent_cfg.timeout_ms);
        let exec = ExecutionContext { deadline, cancel: cancel.clone() };
        let started = StdInstant::now();

        let attempt_result = tokio::select! {
            result = agent.execute(exec, ctx.clone()) => result,
            _ = tokio::time::sleep_until(deadline) => {
                Err(LumenError::timeout(format!("agent {agent_id} timed out"), Some(agent_id.clone())))
            }
            _ = cancel.cancelled() => {
                Err(LumenError::cancelled(format!("agent {agent_id} cancelled mid-execution")))
            }
        };

        let duration_ms = started.elapsed().as_millis() as u64;

        match attempt_result {
            Ok(new_ctx) => {
                success = Some((new_ctx, duration_ms));
                break;
            }
            Err(err) => {
                ctx.audit.agent_runs.push(AgentRun {
                    timestamp: Utc::now(),
                    agent_id: agent_id.clone(),
                    status: AgentRunStatus::Failed,
                    duration_ms,
                    keys_written: Vec::new(),
                    error: Some(err.to_string()),
                });
                let is_last = attempt + 1 == attempts_allowed;
                last_error = Some(err);
                if !is_last {
                    tokio::time::sleep(RETRY_BACKOFF).await;
                }
            }
        }
    }

    let (mut new_ctx, duration_ms) = match success {
        Some(v) => v,
        None => {
            let err = last_error.expect("at least one attempt was made");
            return Err(err.with_partial_context(ctx));
        }
    };

    if options.validate_contract {
        let outcome = ContractValidator::validate_postconditions(&new_ctx, &agent.postconditions());
        if !outcome.valid {
            let message = outcome.error.unwrap_or_default();
            if options.fail_on_violation {
                return Err(LumenError::validation_failure(message, Some(agent_id)));
            }
            new_ctx.diagnostics.warnings.push(Warning {
                timestamp: Utc::now(),
                message,
                agent_id: Some(agent_id.clone()),
            });
        }
    }

    if let Some(tracker) = tracker {
        let diff = tracker.capture(&agent_id, &new_ctx)?;
        new_ctx.audit.diffs.push(diff);
    }

    new_ctx.audit.agent_runs.push(AgentRun {
        timestamp: Utc::now(),
        agent_id: agent_id.clone(),
        status: AgentRunStatus::Success,
        duration_ms,
        keys_written: Vec::new(),
        error: None,
    });

    if options.track_performance {
        let post_calls = new_ctx.llm.decisions.iter().filter(|d| d.agent_id == agent_id).count();
        let post_tokens = new_ctx.llm.usage.by_agent.get(&agent_id).copied().unwrap_or(0);
        let post_cost = new_ctx.llm.usage.cost_by_agent.get(&agent_id).copied().unwrap_or(0.0);

        let metric = new_ctx.diagnostics.performance.agent_metrics.entry(agent_id).or_default();
        metric.duration_ms += duration_ms;
        metric.llm_calls += post_calls.saturating_sub(pre_calls) as u64;
        metric.tokens += post_tokens.saturating_sub(pre_tokens);
        metric.cost += (post_cost - pre_cost).max(0.0);
        metric.status = "success".to_string();
    }

    Ok(new_ctx)
}
