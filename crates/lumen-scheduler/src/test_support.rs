//! Test-only `Agent` implementations shared by this crate's scenario tests.

#![cfg(test)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use lumen_types::{AgentContext, Intent, LumenError};

use crate::agent::{Agent, ExecutionContext};

/// Writes one `Intent` tagged with its own ID into `ctx.reasoning.intents`.
pub struct RecordingAgent {
    pub id: String,
}

#[async_trait]
impl Agent for RecordingAgent {
    fn agent_id(&self) -> &str {
        &self.id
    }

    fn postconditions(&self) -> Vec<String> {
        vec!["reasoning.intents".to_string()]
    }

    async fn execute(&self, _exec: ExecutionContext, mut ctx: AgentContext) -> Result<AgentContext, LumenError> {
        ctx.reasoning.intents.push(Intent { r#type: self.id.clone(), confidence: 1.0, entities: vec![] });
        Ok(ctx)
    }
}

/// Fails its first `fail_times` invocations, then succeeds like `RecordingAgent`.
pub struct FlakyAgent {
    pub id: String,
    pub fail_times: usize,
    pub attempts: AtomicUsize,
}

#[async_trait]
impl Agent for FlakyAgent {
    fn agent_id(&self) -> &str {
        &self.id
    }

    async fn execute(&self, _exec: ExecutionContext, mut ctx: AgentContext) -> Result<AgentContext, LumenError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.fail_times {
            return Err(LumenError::agent_execution_error(
                format!("{} transient failure on attempt {attempt}", self.id),
                Some(self.id.clone()),
            ));
        }
        ctx.reasoning.intents.push(Intent { r#type: self.id.clone(), confidence: 1.0, entities: vec![] });
        Ok(ctx)
    }
}

/// Sleeps past its own deadline on every attempt.
pub struct SlowAgent {
    pub id: String,
    pub sleep_ms: u64,
}

#[async_trait]
impl Agent for SlowAgent {
    fn agent_id(&self) -> &str {
        &self.id
    }

    async fn execute(&self, _exec: ExecutionContext, ctx: AgentContext) -> Result<AgentContext, LumenError> {
        tokio::time::sleep(std::time::Duration::from_millis(self.sleep_ms)).await;
        Ok(ctx)
    }
}

pub fn recording(id: &str) -> Arc<dyn Agent> {
    Arc::new(RecordingAgent { id: id.to_string() })
}
