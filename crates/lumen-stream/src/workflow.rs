//! Named reasoning workflows, each backed by its own `ReasoningManager`.

use std::collections::HashMap;
use std::sync::Arc;

use lumen_scheduler::ReasoningManager;
use lumen_types::LumenError;

/// Registry of named pipelines plus the name used when the caller omits
/// `X-Workflow` (spec §6).
pub struct WorkflowRegistry {
    workflows: HashMap<String, Arc<ReasoningManager>>,
    default_workflow: String,
}

impl WorkflowRegistry {
    /// Build a registry. `default_workflow` must be a key of `workflows`.
    pub fn new(workflows: HashMap<String, Arc<ReasoningManager>>, default_workflow: impl Into<String>) -> Result<Self, LumenError> {
        let default_workflow = default_workflow.into();
        if !workflows.contains_key(&default_workflow) {
            return Err(LumenError::bad_request(format!(
                "default workflow '{default_workflow}' is not registered"
            )));
        }
        Ok(Self { workflows, default_workflow })
    }

    /// Names of every registered workflow, for `GET /workflows`.
    pub fn names(&self) -> Vec<String> {
        self.workflows.keys().cloned().collect()
    }

    /// The default workflow's name.
    pub fn default_workflow(&self) -> &str {
        &self.default_workflow
    }

    /// Resolve `requested` (the `X-Workflow` header value, if any) to a
    /// `(name, manager)` pair, falling back to the default workflow.
    pub fn resolve(&self, requested: Option<&str>) -> Result<(&str, Arc<ReasoningManager>), LumenError> {
        let name = requested.unwrap_or(&self.default_workflow);
        match self.workflows.get_key_value(name) {
            Some((name, manager)) => Ok((name.as_str(), manager.clone())),
            None => Err(LumenError::bad_request(format!("unknown workflow '{name}'"))),
        }
    }
}
