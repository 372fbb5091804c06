use crate::context::AgentContext;

/// Error kinds produced by the pipeline scheduler and LLM orchestrator.
///
/// Every variant carries a human-readable message and, where applicable, the
/// offending agent or model. `partial_context` is attached by callers that
/// want to surface the last successfully-produced context alongside the
/// error rather than returning `None` (see the Open Questions resolution in
/// `DESIGN.md`).
#[derive(Debug, thiserror::Error)]
pub enum LumenError {
    /// Malformed input, unknown workflow, unknown provider, invalid mode.
    #[error("bad request: {message}")]
    BadRequest {
        /// Description of the malformed input.
        message: String,
    },

    /// A pre- or postcondition was not satisfied.
    #[error("validation failure{}: {message}", agent_suffix(.agent_id))]
    ValidationFailure {
        /// Description of the unmet condition.
        message: String,
        /// Agent whose contract failed, if any.
        agent_id: Option<String>,
    },

    /// Session or per-agent budget exceeded for a non-critical agent.
    #[error("budget exceeded{}: {message}", agent_suffix(.agent_id))]
    BudgetExceeded {
        /// Description of which budget was exceeded.
        message: String,
        /// Agent whose request was rejected.
        agent_id: Option<String>,
    },

    /// No suitable model under size/budget constraints.
    #[error("provider unavailable: {message}")]
    ProviderUnavailable {
        /// Description of why no provider could serve the request.
        message: String,
        /// Model that was requested, if known.
        model: Option<String>,
    },

    /// An agent's `Execute` call failed.
    #[error("agent execution error{}: {message}", agent_suffix(.agent_id))]
    AgentExecutionError {
        /// Underlying failure description.
        message: String,
        /// Agent that failed.
        agent_id: Option<String>,
        /// Last successfully-produced context, if any.
        partial_context: Option<Box<AgentContext>>,
    },

    /// Per-agent or per-request deadline elapsed.
    #[error("timeout{}: {message}", agent_suffix(.agent_id))]
    Timeout {
        /// Description of which deadline elapsed.
        message: String,
        /// Agent whose execution timed out, if applicable.
        agent_id: Option<String>,
    },

    /// Caller-side cancellation observed.
    #[error("cancelled: {message}")]
    Cancelled {
        /// Description of when cancellation was observed.
        message: String,
    },

    /// Parallel-mode dependency graph has no valid topological order.
    #[error("cycle detected: {message}")]
    CycleDetected {
        /// Description identifying the agents involved in the cycle.
        message: String,
    },

    /// An invariant the core relies on was violated (e.g. clone failure).
    #[error("internal invariant violated: {message}")]
    InternalInvariant {
        /// Description of the violated invariant.
        message: String,
    },
}

fn agent_suffix(agent_id: &Option<String>) -> String {
    match agent_id {
        Some(id) => format!(" (agent {id})"),
        None => String::new(),
    }
}

impl LumenError {
    /// Construct a `BadRequest` error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest { message: message.into() }
    }

    /// Construct a `ValidationFailure` error.
    pub fn validation_failure(message: impl Into<String>, agent_id: Option<String>) -> Self {
        Self::ValidationFailure { message: message.into(), agent_id }
    }

    /// Construct a `BudgetExceeded` error.
    pub fn budget_exceeded(message: impl Into<String>, agent_id: Option<String>) -> Self {
        Self::BudgetExceeded { message: message.into(), agent_id }
    }

    /// Construct a `ProviderUnavailable` error.
    pub fn provider_unavailable(message: impl Into<String>, model: Option<String>) -> Self {
        Self::ProviderUnavailable { message: message.into(), model }
    }

    /// Construct an `AgentExecutionError` with no partial context attached.
    pub fn agent_execution_error(message: impl Into<String>, agent_id: Option<String>) -> Self {
        Self::AgentExecutionError { message: message.into(), agent_id, partial_context: None }
    }

    /// Attach the last successfully-produced context to this error, if the
    /// variant supports it.
    pub fn with_partial_context(mut self, ctx: AgentContext) -> Self {
        if let Self::AgentExecutionError { partial_context, .. } = &mut self {
            *partial_context = Some(Box::new(ctx));
        }
        self
    }

    /// Construct a `Timeout` error.
    pub fn timeout(message: impl Into<String>, agent_id: Option<String>) -> Self {
        Self::Timeout { message: message.into(), agent_id }
    }

    /// Construct a `Cancelled` error.
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::Cancelled { message: message.into() }
    }

    /// Construct a `CycleDetected` error.
    pub fn cycle_detected(message: impl Into<String>) -> Self {
        Self::CycleDetected { message: message.into() }
    }

    /// Construct an `InternalInvariant` error.
    pub fn internal_invariant(message: impl Into<String>) -> Self {
        Self::InternalInvariant { message: message.into() }
    }

    /// True if this error class should be retried by the scheduler's
    /// per-agent retry accounting (`AgentExecutionError` and `Timeout`).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::AgentExecutionError { .. } | Self::Timeout { .. })
    }
}
