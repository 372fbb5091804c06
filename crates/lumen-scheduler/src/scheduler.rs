//! `ReasoningManager`: dispatches a `PipelineConfig` to the mode-specific
//! executor and owns the agent registry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use lumen_types::{AgentContext, ExecutionMode, LumenError, PipelineConfig};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::agent::Agent;
use crate::{conditional, parallel, sequential};

/// Registry mapping agent ID to its implementation, plus the pipeline
/// configuration and mode dispatch.
///
/// The registry sits behind an `RwLock` per spec §5 ("The ReasoningManager
/// uses an RW lock for the agent registry"); reads (every pipeline run) take
/// a shared lock, registration takes an exclusive one. Values are
/// `Arc<dyn Agent>` rather than `Box<dyn Agent>` so Parallel mode can hand a
/// cheaply cloned snapshot of the registry into concurrently spawned tasks
/// without holding the lock guard across an `.await`.
pub struct ReasoningManager {
    agents: RwLock<HashMap<String, Arc<dyn Agent>>>,
    config: PipelineConfig,
}

impl ReasoningManager {
    /// Construct a manager for `config`, validating its structural
    /// invariants (unique agent IDs, acyclic `depends_on`).
    pub fn new(config: PipelineConfig) -> Result<Self, LumenError> {
        config.validate().map_err(LumenError::bad_request)?;
        Ok(Self { agents: RwLock::new(HashMap::new()), config })
    }

    /// Register (or replace) the implementation for one agent.
    pub async fn register(&self, agent: Arc<dyn Agent>) {
        let id = agent.agent_id().to_string();
        self.agents.write().await.insert(id, agent);
    }

    /// Run the configured pipeline against `ctx`, dispatching to the
    /// execution mode declared in `PipelineConfig.mode`.
    pub async fn run(&self, ctx: AgentContext, cancel: CancellationToken) -> Result<AgentContext, LumenError> {
        let started = Instant::now();
        let options = self.config.options.clone();

        let result = match self.config.mode {
            ExecutionMode::Sequential => {
                let agents = self.agents.read().await;
                sequential::run(&self.config.agents, &agents, ctx, &options, &cancel).await
            }
            ExecutionMode::Conditional => {
                let agents = self.agents.read().await;
                conditional::run(&self.config.agents, &agents, ctx, &options, &cancel).await
            }
            ExecutionMode::Parallel => {
                let snapshot = Arc::new(self.agents.read().await.clone());
                parallel::run(&self.config.agents, snapshot, ctx, options.clone(), cancel).await
            }
        };

        result.map(|mut ctx| {
            if options.track_performance {
                ctx.diagnostics.performance.total_duration_ms = started.elapsed().as_millis() as u64;
            }
            ctx
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    use lumen_types::{AgentContext, AgentConfig, AgentRunStatus, ExecutionMode, PipelineConfig, PipelineOptions};

    use super::*;
    use crate::test_support::{recording, FlakyAgent, SlowAgent};

    fn cfg(id: &str, deps: &[&str]) -> AgentConfig {
        AgentConfig {
            id: id.to_string(),
            enabled: true,
            depends_on: deps.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
            timeout_ms: 1_000,
            retry: 0,
            conditions: vec![],
        }
    }

    fn lenient_options() -> PipelineOptions {
        PipelineOptions { validate_contract: false, ..PipelineOptions::default() }
    }

    #[tokio::test]
    async fn s1_sequential_happy_path_orders_agent_runs() {
        let config = PipelineConfig {
            mode: ExecutionMode::Sequential,
            agents: vec![cfg("a", &[]), cfg("b", &[]), cfg("c", &[])],
            options: lenient_options(),
        };
        let manager = ReasoningManager::new(config).unwrap();
        manager.register(recording("a")).await;
        manager.register(recording("b")).await;
        manager.register(recording("c")).await;

        let ctx = AgentContext::new("session-1", "trace-1");
        let result = manager.run(ctx, CancellationToken::new()).await.unwrap();

        let order: Vec<&str> = result.audit.agent_runs.iter().map(|r| r.agent_id.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
        assert!(result.audit.agent_runs.iter().all(|r| r.status == AgentRunStatus::Success));
    }

    #[tokio::test]
    async fn s2_retry_recovers_from_transient_failure() {
        let config = PipelineConfig {
            mode: ExecutionMode::Sequential,
            agents: vec![AgentConfig { retry: 2, ..cfg("flaky", &[]) }],
            options: lenient_options(),
        };
        let manager = ReasoningManager::new(config).unwrap();
        manager
            .register(Arc::new(FlakyAgent { id: "flaky".to_string(), fail_times: 2, attempts: AtomicUsize::new(0) }))
            .await;

        let ctx = AgentContext::new("session-2", "trace-2");
        let result = manager.run(ctx, CancellationToken::new()).await.unwrap();

        let statuses: Vec<_> = result.audit.agent_runs.iter().map(|r| r.status).collect();
        assert_eq!(statuses, vec![AgentRunStatus::Failed, AgentRunStatus::Failed, AgentRunStatus::Success]);
    }

    #[tokio::test]
    async fn s3_parallel_diamond_runs_every_agent_exactly_once() {
        let config = PipelineConfig {
            mode: ExecutionMode::Parallel,
            agents: vec![cfg("root", &[]), cfg("left", &["root"]), cfg("right", &["root"]), cfg("merge", &["left", "right"])],
            options: lenient_options(),
        };
        let manager = ReasoningManager::new(config).unwrap();
        manager.register(recording("root")).await;
        manager.register(recording("left")).await;
        manager.register(recording("right")).await;
        manager.register(recording("merge")).await;

        let ctx = AgentContext::new("session-3", "trace-3");
        let result = manager.run(ctx, CancellationToken::new()).await.unwrap();

        let mut ids: Vec<&str> = result.audit.agent_runs.iter().map(|r| r.agent_id.as_str()).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec!["left", "merge", "right", "root"]);
    }

    #[tokio::test]
    async fn timeout_fails_the_agent() {
        let config = PipelineConfig {
            mode: ExecutionMode::Sequential,
            agents: vec![AgentConfig { timeout_ms: 20, ..cfg("slow", &[]) }],
            options: lenient_options(),
        };
        let manager = ReasoningManager::new(config).unwrap();
        manager.register(Arc::new(SlowAgent { id: "slow".to_string(), sleep_ms: 200 })).await;

        let ctx = AgentContext::new("session-4", "trace-4");
        let err = manager.run(ctx, CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, LumenError::Timeout { .. }));
    }

    #[tokio::test]
    async fn cancellation_before_start_stops_the_run() {
        let config = PipelineConfig {
            mode: ExecutionMode::Sequential,
            agents: vec![cfg("a", &[])],
            options: lenient_options(),
        };
        let manager = ReasoningManager::new(config).unwrap();
        manager.register(recording("a")).await;

        let cancel = CancellationToken::new();
        cancel.cancel();
        let ctx = AgentContext::new("session-5", "trace-5");
        let err = manager.run(ctx, cancel).await.unwrap_err();
        assert!(matches!(err, LumenError::Cancelled { .. }));
    }

    #[tokio::test]
    async fn conditional_mode_skips_unsatisfied_agent() {
        let config = PipelineConfig {
            mode: ExecutionMode::Conditional,
            agents: vec![AgentConfig { conditions: vec!["reasoning.intents".to_string()], ..cfg("gated", &[]) }],
            options: lenient_options(),
        };
        let manager = ReasoningManager::new(config).unwrap();
        manager.register(recording("gated")).await;

        let ctx = AgentContext::new("session-6", "trace-6");
        let result = manager.run(ctx, CancellationToken::new()).await.unwrap();
        assert!(result.audit.agent_runs.is_empty());
    }
}
