//! Declarative pre/postcondition checking over dotted key paths, e.g.
//! `"reasoning.intents"` or `"retrieval.plans"`.

use lumen_types::AgentContext;
use serde_json::Value;

/// Result of a single contract check.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationOutcome {
    /// Whether every declared path resolved to a present, non-empty value.
    pub valid: bool,
    /// The first unsatisfied path, if any.
    pub error: Option<String>,
}

impl ValidationOutcome {
    fn ok() -> Self {
        Self { valid: true, error: None }
    }

    fn violation(path: &str, phase: &str) -> Self {
        Self {
            valid: false,
            error: Some(format!("{phase} validation failed: path '{path}' absent or empty")),
        }
    }
}

/// Checks declared precondition/postcondition key paths against an
/// `AgentContext`.
pub struct ContractValidator;

impl ContractValidator {
    /// `Valid=true` iff every path in `preconditions` resolves to a present
    /// and non-empty value in `ctx`.
    pub fn validate_preconditions(ctx: &AgentContext, preconditions: &[String]) -> ValidationOutcome {
        Self::check(ctx, preconditions, "precondition")
    }

    /// Same predicate as `validate_preconditions`, applied to the
    /// post-execution context for the agent's declared postconditions.
    pub fn validate_postconditions(post: &AgentContext, postconditions: &[String]) -> ValidationOutcome {
        Self::check(post, postconditions, "postcondition")
    }

    fn check(ctx: &AgentContext, paths: &[String], phase: &str) -> ValidationOutcome {
        let value = match serde_json::to_value(ctx) {
            Ok(v) => v,
            Err(_) => {
                return ValidationOutcome {
                    valid: false,
                    error: Some(format!("{phase} validation failed: context not serializable")),
                }
            }
        };
        for path in paths {
            if !path_present_and_non_empty(&value, path) {
                return ValidationOutcome::violation(path, phase);
            }
        }
        ValidationOutcome::ok()
    }
}

fn path_present_and_non_empty(root: &Value, path: &str) -> bool {
    let mut current = root;
    for segment in path.split('.') {
        match current.get(segment) {
            Some(next) => current = next,
            None => return false,
        }
    }
    is_non_empty(current)
}

fn is_non_empty(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_types::Intent;

    #[test]
    fn empty_sequence_fails_validation() {
        let ctx = AgentContext::new("s", "t");
        let outcome = ContractValidator::validate_preconditions(&ctx, &["reasoning.intents".to_string()]);
        assert!(!outcome.valid);
    }

    #[test]
    fn populated_sequence_passes_validation() {
        let mut ctx = AgentContext::new("s", "t");
        ctx.reasoning.intents.push(Intent {
            r#type: "x".into(),
            confidence: 1.0,
            entities: vec![],
        });
        let outcome = ContractValidator::validate_preconditions(&ctx, &["reasoning.intents".to_string()]);
        assert!(outcome.valid);
    }

    #[test]
    fn empty_condition_list_always_satisfied() {
        let ctx = AgentContext::new("s", "t");
        let outcome = ContractValidator::validate_preconditions(&ctx, &[]);
        assert!(outcome.valid);
    }
}
