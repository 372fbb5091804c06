//! Cache entry and token-bucket value types. The algorithms that operate on
//! these (TTL lookup, refill) live in `lumen-llm`; this crate only owns the
//! shapes so `lumen-types` stays free of async/locking concerns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Coarse task classification driving both model-selection strategy lookup
/// and cache TTL class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskClass {
    /// Intent/entity classification, simple validation.
    Classification,
    /// Text or medium-complexity synthesis.
    Synthesis,
    /// Advanced, deep reasoning tasks.
    Inference,
}

impl TaskClass {
    /// Classify a free-form task-type string into a TTL class, defaulting
    /// to `Synthesis` for anything unrecognized (spec §4.4 "default" row).
    pub fn classify(task_type: &str) -> Self {
        match task_type {
            "intent_classification" | "entity_extraction" | "validation" => {
                TaskClass::Classification
            }
            "deep_reasoning" | "advanced_inference" => TaskClass::Inference,
            _ => TaskClass::Synthesis,
        }
    }
}

/// One cached LLM response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Cached response text.
    pub response: String,
    /// Token count of the original response.
    pub tokens: u64,
    /// Cost in USD of the original response.
    pub cost: f64,
    /// When the entry was written.
    pub cached_at: DateTime<Utc>,
    /// `cached_at + TTL(task_type)`.
    pub expires_at: DateTime<Utc>,
    /// Number of times this entry has been returned on a hit.
    pub hit_count: u64,
}

/// Per-`"provider/model"` token bucket state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenBucket {
    /// Maximum requests per second, and bucket capacity.
    pub max_rps: u32,
    /// Tokens currently available, always in `[0, max_rps]`.
    pub tokens: f64,
    /// When the bucket was last refilled.
    pub last_refill: DateTime<Utc>,
    /// Configured per-request timeout in milliseconds.
    pub request_timeout_ms: u64,
}

impl TokenBucket {
    /// Construct a full bucket for `max_rps` with the given timeout.
    pub fn new(max_rps: u32, request_timeout_ms: u64) -> Self {
        Self {
            max_rps,
            tokens: max_rps as f64,
            last_refill: Utc::now(),
            request_timeout_ms,
        }
    }
}
