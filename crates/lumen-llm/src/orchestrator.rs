//! Model selection, budget enforcement, and the `Call` path binding the
//! `Throttler`, `ResponseCache`, and an `LlmProvider` together.

use std::collections::HashMap;

use chrono::Utc;
use lumen_types::{AgentContext, BudgetConstraints, Decision, LumenError, ModelProfile, ModelSelectionStrategy};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::cache::{cache_key, ResponseCache};
use crate::provider::{LlmProvider, ProviderRequest};
use crate::throttle::Throttler;

/// A request for one LLM call, as seen by the orchestrator.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    /// The prompt to send.
    pub prompt: String,
    /// Task classification, drives strategy and cache-TTL lookup.
    pub task_type: String,
    /// Agent this request is made on behalf of.
    pub agent_id: String,
    /// Requested max output tokens.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Size of the context the prompt is drawn from, in tokens.
    pub context_size: u32,
    /// Whether a cache lookup/save should be attempted.
    pub use_cache: bool,
}

/// The result of one LLM call.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// Generated (or cached) text.
    pub content: String,
    /// Token count, estimated for fresh calls, exact for cache hits.
    pub tokens: u64,
    /// Cost in USD attributed to this call (`0.0` on cache hit).
    pub cost: f64,
    /// True iff this response was served from the cache.
    pub from_cache: bool,
}

#[derive(Default)]
struct BudgetLedger {
    session_spent_usd: f64,
    agent_spent_usd: HashMap<String, f64>,
}

/// Selects a model per task, enforces budget, and wraps provider calls with
/// caching and rate limiting.
///
/// All mutable selection/budget/decision state sits behind a single
/// `RwLock`, matching the single-lock discipline spec §4.5/§5 call for; the
/// cache and throttler each own their own lock internally.
pub struct LlmOrchestrator {
    profiles: RwLock<HashMap<String, ModelProfile>>,
    strategies: RwLock<ModelSelectionStrategy>,
    budget_constraints: BudgetConstraints,
    ledger: RwLock<BudgetLedger>,
    throttler: Throttler,
    cache: ResponseCache,
}

impl LlmOrchestrator {
    /// Construct an orchestrator over an initial model catalog, selection
    /// strategy set, and budget policy.
    pub fn new(
        profiles: Vec<ModelProfile>,
        strategies: ModelSelectionStrategy,
        budget_constraints: BudgetConstraints,
        cache_max_size_mb: usize,
    ) -> Self {
        let profiles = profiles.into_iter().map(|p| (p.key(), p)).collect();
        Self {
            profiles: RwLock::new(profiles),
            strategies: RwLock::new(strategies),
            budget_constraints,
            ledger: RwLock::new(BudgetLedger::default()),
            throttler: Throttler::new(),
            cache: ResponseCache::new(cache_max_size_mb),
        }
    }

    /// Add or replace a model profile in the process-wide catalog.
    pub async fn upsert_profile(&self, profile: ModelProfile) {
        self.profiles.write().await.insert(profile.key(), profile);
    }

    /// The throttler backing this orchestrator's rate limiting.
    pub fn throttler(&self) -> &Throttler {
        &self.throttler
    }

    /// The cache backing this orchestrator's response reuse.
    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// `CostPer1KTokens * tokens / 1000`.
    pub fn calculate_cost(profile: &ModelProfile, tokens: u64) -> f64 {
        profile.cost_per_1k_tokens * tokens as f64 / 1000.0
    }

    async fn evaluate_budget(&self, agent_id: &str) -> Result<(), LumenError> {
        if self.budget_constraints.is_critical(agent_id) {
            return Ok(());
        }
        let ledger = self.ledger.read().await;
        if ledger.session_spent_usd >= self.budget_constraints.session_budget_usd {
            return Err(LumenError::budget_exceeded(
                "session budget exceeded",
                Some(agent_id.to_string()),
            ));
        }
        let spent = ledger.agent_spent_usd.get(agent_id).copied().unwrap_or(0.0);
        if spent >= self.budget_constraints.agent_budget_usd {
            return Err(LumenError::budget_exceeded(
                "agent budget exceeded",
                Some(agent_id.to_string()),
            ));
        }
        Ok(())
    }

    async fn track_usage(&self, agent_id: &str, cost: f64) {
        let mut ledger = self.ledger.write().await;
        ledger.session_spent_usd += cost;
        *ledger.agent_spent_usd.entry(agent_id.to_string()).or_insert(0.0) += cost;
    }

    /// Select a model for `task_type`/`context_size`, recording a `Decision`
    /// onto `ctx` and returning the chosen profile. Tries `DefaultModel`,
    /// then `Fallback1`, then `Fallback2`; a candidate is suitable iff its
    /// profile exists and `context_size <= profile.context_limit`.
    pub async fn select_model(
        &self,
        ctx: &mut AgentContext,
        agent_id: &str,
        task_type: &str,
        context_size: u32,
    ) -> Result<ModelProfile, LumenError> {
        self.evaluate_budget(agent_id).await?;

        let strategies = self.strategies.read().await;
        let strategy = strategies
            .lookup(task_type)
            .ok_or_else(|| LumenError::provider_unavailable("no selection strategy", None))?;

        let candidates = [
            strategy.default_model.clone(),
            strategy.fallback1.clone(),
            strategy.fallback2.clone(),
        ];
        let complexity = strategy.complexity;
        drop(strategies);

        let profiles = self.profiles.read().await;
        for (rank, key) in candidates.iter().enumerate() {
            if let Some(profile) = profiles.get(key) {
                if context_size <= profile.context_limit {
                    let reason = format!(
                        "rank {rank} candidate '{key}' selected: quality={:.2} speed={:.2} cost_per_1k={:.4}",
                        profile.quality, profile.speed, profile.cost_per_1k_tokens
                    );
                    ctx.llm.decisions.push(Decision {
                        timestamp: Utc::now(),
                        agent_id: agent_id.to_string(),
                        task_type: task_type.to_string(),
                        selected: key.clone(),
                        reason,
                        complexity,
                    });
                    return Ok(profile.clone());
                }
            }
        }
        Err(LumenError::provider_unavailable(
            format!("no suitable model for task '{task_type}' under context size {context_size}"),
            None,
        ))
    }

    /// Execute one LLM call: cache probe, model selection, rate limiting,
    /// provider invocation, cost tracking, and cache save (spec §4.5 steps 1-5).
    pub async fn call(
        &self,
        ctx: &mut AgentContext,
        req: LlmRequest,
        provider: &dyn LlmProvider,
        cancel: &CancellationToken,
    ) -> Result<LlmResponse, LumenError> {
        let profile = self
            .select_model(ctx, &req.agent_id, &req.task_type, req.context_size)
            .await?;

        let key = cache_key(&req.prompt, &profile.model, req.max_tokens, req.temperature, &req.task_type);

        if req.use_cache {
            if let Some(entry) = self.cache.get(&key).await {
                ctx.llm.cache_annotations.insert(key, true);
                return Ok(LlmResponse {
                    content: entry.response,
                    tokens: entry.tokens,
                    cost: 0.0,
                    from_cache: true,
                });
            }
            ctx.llm.cache_annotations.insert(key.clone(), false);
        }

        self.throttler
            .acquire(&profile.provider, &profile.model, cancel)
            .await
            .map_err(|_| LumenError::cancelled("rate-limit acquire cancelled"))?;

        let mut rx = provider
            .stream_completion(ProviderRequest {
                prompt: req.prompt.clone(),
                model: profile.model.clone(),
                max_tokens: req.max_tokens,
                temperature: req.temperature,
            })
            .await
            .map_err(|e| LumenError::provider_unavailable(e, Some(profile.model.clone())))?;

        let mut content = String::new();
        loop {
            tokio::select! {
                chunk = rx.recv() => {
                    match chunk {
                        Some(chunk) => {
                            content.push_str(&chunk.delta);
                            if chunk.is_final {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = cancel.cancelled() => {
                    return Err(LumenError::cancelled("provider stream cancelled"));
                }
            }
        }

        let tokens = (req.prompt.len() as u64 / 4) + (content.len() as u64 / 4);
        let cost = Self::calculate_cost(&profile, tokens);
        self.track_usage(&req.agent_id, cost).await;

        ctx.llm.provider = Some(profile.provider.clone());
        ctx.llm.model = Some(profile.model.clone());
        ctx.llm.usage.total_tokens += tokens;
        ctx.llm.usage.cost_usd += cost;
        *ctx.llm.usage.by_agent.entry(req.agent_id.clone()).or_insert(0) += tokens;
        *ctx.llm.usage.cost_by_agent.entry(req.agent_id.clone()).or_insert(0.0) += cost;

        if req.use_cache {
            self.cache
                .save(&key, content.clone(), tokens, cost, &req.task_type)
                .await;
        }

        Ok(LlmResponse { content, tokens, cost, from_cache: false })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::EchoProvider;
    use lumen_types::StrategyEntry;
    use std::collections::{BTreeSet, HashMap as StdHashMap};

    fn test_profile(provider: &str, model: &str, cost: f64) -> ModelProfile {
        ModelProfile {
            provider: provider.into(),
            model: model.into(),
            quality: 0.8,
            speed: 0.8,
            cost_per_1k_tokens: cost,
            context_limit: 8_000,
            max_requests_per_second: 100,
            request_timeout_ms: 5_000,
        }
    }

    fn test_strategy() -> ModelSelectionStrategy {
        let mut strategies = StdHashMap::new();
        strategies.insert(
            "default".to_string(),
            StrategyEntry {
                complexity: 0.5,
                default_model: "openai/gpt-4o".to_string(),
                fallback1: "openai/gpt-4o".to_string(),
                fallback2: "openai/gpt-4o".to_string(),
                max_context_size: 8_000,
            },
        );
        ModelSelectionStrategy { strategies }
    }

    #[tokio::test]
    async fn budget_exceeded_rejects_non_critical_agent() {
        let budget = BudgetConstraints {
            session_budget_usd: 0.01,
            agent_budget_usd: 100.0,
            warning_threshold: 0.8,
            emergency_degradation_enabled: false,
            critical_agents: BTreeSet::from(["agent_critical".to_string()]),
        };
        let orchestrator =
            LlmOrchestrator::new(vec![test_profile("openai", "gpt-4o", 15.0)], test_strategy(), budget, 0);
        orchestrator.track_usage("agent_normal", 0.01).await;

        let mut ctx = AgentContext::new("s", "t");
        let err = orchestrator
            .select_model(&mut ctx, "agent_normal", "default", 1_000)
            .await
            .unwrap_err();
        assert!(matches!(err, LumenError::BudgetExceeded { .. }));

        let ok = orchestrator
            .select_model(&mut ctx, "agent_critical", "default", 1_000)
            .await;
        assert!(ok.is_ok());
    }

    #[tokio::test]
    async fn cache_hit_increments_hit_count() {
        let budget = BudgetConstraints {
            session_budget_usd: 100.0,
            agent_budget_usd: 100.0,
            warning_threshold: 0.8,
            emergency_degradation_enabled: false,
            critical_agents: BTreeSet::new(),
        };
        let orchestrator =
            LlmOrchestrator::new(vec![test_profile("openai", "gpt-4o", 1.0)], test_strategy(), budget, 0);
        let provider = EchoProvider::new("openai");
        let cancel = CancellationToken::new();
        let mut ctx = AgentContext::new("s", "t");

        let req = LlmRequest {
            prompt: "hi".into(),
            task_type: "default".into(),
            agent_id: "agent_a".into(),
            max_tokens: 100,
            temperature: 0.0,
            context_size: 10,
            use_cache: true,
        };

        let first = orchestrator.call(&mut ctx, req.clone(), &provider, &cancel).await.unwrap();
        assert!(!first.from_cache);

        let second = orchestrator.call(&mut ctx, req, &provider, &cancel).await.unwrap();
        assert!(second.from_cache);
        assert_eq!(second.content, first.content);
    }
}
