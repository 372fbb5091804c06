#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **lumen-stream** – `StreamingOrchestrator`: binds one inbound completion
//! request to a named reasoning workflow and a provider completion stream,
//! emitting an ordered event channel.

pub mod event;
pub mod orchestrator;
pub mod provider_select;
pub mod request;
pub mod workflow;

pub use event::{StreamEvent, CHANNEL_CAPACITY};
pub use orchestrator::StreamingOrchestrator;
pub use provider_select::select_provider;
pub use request::{ChatMessage, CompletionRequest};
pub use workflow::WorkflowRegistry;
