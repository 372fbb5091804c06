#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **lumen-scheduler** – `ReasoningManager`, the dependency-levelized
//! scheduler that runs a `PipelineConfig` of agents against a shared
//! `AgentContext` in Sequential, Parallel, or Conditional mode.

pub mod agent;
pub mod conditional;
pub mod dependency;
pub mod executor;
pub mod parallel;
pub mod scheduler;
pub mod sequential;
#[cfg(test)]
mod test_support;

pub use agent::{Agent, ExecutionContext};
pub use dependency::compute_levels;
pub use executor::execute_agent;
pub use scheduler::ReasoningManager;
