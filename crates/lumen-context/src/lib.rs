#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **lumen-context** – `DiffTracker` and `ContractValidator` over the shared
//! `AgentContext` defined in `lumen-types`.

/// Declarative pre/postcondition checking over dotted key paths.
pub mod contract;
/// Structural delta capture between context snapshots.
pub mod diff;

pub use contract::{ContractValidator, ValidationOutcome};
pub use diff::DiffTracker;
