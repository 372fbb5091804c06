#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **lumen-metrics** – per-session cost/performance collectors and the
//! `AlertManager` that checks budget, SLA, error-rate, and memory
//! thresholds against them (spec §4.8).

pub mod alert;
pub mod collector;

pub use alert::{Alert, AlertManager, AlertThresholds, Severity};
pub use collector::{AgentStats, SessionCollector};
