//! Events emitted on the `StreamingOrchestrator`'s bounded channel.

/// Default channel buffer size (spec §4.7: "bounded channel (buffer 10 by
/// default)").
pub const CHANNEL_CAPACITY: usize = 10;

/// One event on a streaming completion's producer channel, in emission
/// order: exactly one `Reasoning`, then zero or more `Completion`, then
/// exactly one of `Done`/`Error`.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// Emitted once, after the reasoning pipeline finishes and before any
    /// provider chunk is forwarded.
    Reasoning {
        /// Short human-readable summary of what the pipeline concluded.
        summary: String,
        /// Wall-clock duration of the pipeline run.
        duration_ms: u64,
    },
    /// One forwarded provider chunk.
    Completion {
        /// Text delta for this chunk.
        delta: String,
    },
    /// Terminal success marker; no further events follow.
    Done,
    /// Terminal failure marker; no further events follow.
    Error {
        /// Human-readable failure description.
        message: String,
    },
}
