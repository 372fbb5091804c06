//! Structural delta capture between an `AgentContext` snapshot and the
//! post-execution context produced by one agent.

use chrono::Utc;
use lumen_types::{AgentContext, Change, ContextDiff, LumenError};
use serde_json::Value;

/// The five subtrees an agent may mutate; `Audit` is excluded since it
/// records the run itself rather than agent output.
const TRACKED_SUBTREES: [&str; 5] =
    ["reasoning", "enrichment", "retrieval", "llm", "diagnostics"];

/// Captures a pre-execution snapshot of an `AgentContext` and computes the
/// structural delta against a post-execution context.
pub struct DiffTracker {
    pre: Value,
}

impl DiffTracker {
    /// Capture a clone of the pre-state.
    pub fn new(pre: &AgentContext) -> Result<Self, LumenError> {
        let pre = serde_json::to_value(pre.clone())
            .map_err(|e| LumenError::internal_invariant(format!("diff snapshot failed: {e}")))?;
        Ok(Self { pre })
    }

    /// Return the structural delta between the captured snapshot and
    /// `post`, attributed to `agent_id`. An agent that mutated nothing
    /// yields a diff with an empty change set.
    pub fn capture(&self, agent_id: &str, post: &AgentContext) -> Result<ContextDiff, LumenError> {
        let post_value = serde_json::to_value(post.clone())
            .map_err(|e| LumenError::internal_invariant(format!("diff capture failed: {e}")))?;

        let mut changes = Vec::new();
        for subtree in TRACKED_SUBTREES {
            let pre_fields = self.pre.get(subtree).and_then(Value::as_object);
            let post_fields = post_value.get(subtree).and_then(Value::as_object);
            diff_object(subtree, pre_fields, post_fields, &mut changes);
        }

        Ok(ContextDiff {
            timestamp: Utc::now(),
            agent_id: agent_id.to_string(),
            changes,
        })
    }
}

fn diff_object(
    prefix: &str,
    pre: Option<&serde_json::Map<String, Value>>,
    post: Option<&serde_json::Map<String, Value>>,
    out: &mut Vec<Change>,
) {
    let empty = serde_json::Map::new();
    let pre = pre.unwrap_or(&empty);
    let post = post.unwrap_or(&empty);

    for (key, post_value) in post {
        let path = format!("{prefix}.{key}");
        match pre.get(key) {
            None => out.push(Change::Added { path }),
            Some(pre_value) if pre_value != post_value => out.push(Change::Changed { path }),
            Some(_) => {}
        }
    }
    for key in pre.keys() {
        if !post.contains_key(key) {
            out.push(Change::Removed {
                path: format!("{prefix}.{key}"),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_types::Intent;

    #[test]
    fn no_mutation_yields_empty_diff() {
        let ctx = AgentContext::new("s", "t");
        let tracker = DiffTracker::new(&ctx).unwrap();
        let diff = tracker.capture("agent-a", &ctx).unwrap();
        assert!(diff.changes.is_empty());
    }

    #[test]
    fn mutation_is_reported_as_changed() {
        let ctx = AgentContext::new("s", "t");
        let tracker = DiffTracker::new(&ctx).unwrap();
        let mut post = ctx.clone();
        post.reasoning.intents.push(Intent {
            r#type: "book_flight".into(),
            confidence: 0.5,
            entities: vec![],
        });
        let diff = tracker.capture("agent-a", &post).unwrap();
        assert!(diff
            .changes
            .iter()
            .any(|c| matches!(c, Change::Changed { path } if path == "reasoning.intents")));
    }
}
