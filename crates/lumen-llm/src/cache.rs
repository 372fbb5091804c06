//! TTL-keyed response cache with LRU, size-bounded eviction.
//!
//! The cache key and TTL-by-task-class rules come straight from spec §4.4;
//! the eviction policy itself was left an open question there and is
//! resolved here as LRU over a byte-size budget (see `DESIGN.md`).

use std::time::Duration;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use lumen_types::{CacheEntry, TaskClass};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

/// TTL applied to classification-class tasks.
pub const CLASSIFICATION_TTL: Duration = Duration::from_secs(60);
/// TTL applied to synthesis-class tasks (and the default class).
pub const SYNTHESIS_TTL: Duration = Duration::from_secs(30);
/// TTL applied to inference-class tasks.
pub const INFERENCE_TTL: Duration = Duration::from_secs(15);

fn ttl_for(class: TaskClass) -> Duration {
    match class {
        TaskClass::Classification => CLASSIFICATION_TTL,
        TaskClass::Synthesis => SYNTHESIS_TTL,
        TaskClass::Inference => INFERENCE_TTL,
    }
}

/// Derive the cache key `SHA-256(prompt|model|max_tokens|temperature|task_type)`.
pub fn cache_key(prompt: &str, model: &str, max_tokens: u32, temperature: f32, task_type: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    hasher.update(b"|");
    hasher.update(model.as_bytes());
    hasher.update(b"|");
    hasher.update(max_tokens.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(temperature.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(task_type.as_bytes());
    format!("{:x}", hasher.finalize())
}

struct Slot {
    entry: CacheEntry,
    size_bytes: usize,
}

/// Concurrency-safe, TTL-expiring, LRU-bounded response cache.
pub struct ResponseCache {
    max_size_bytes: usize,
    entries: RwLock<IndexMap<String, Slot>>,
}

impl ResponseCache {
    /// Construct a cache with a byte-size budget; `max_size_mb == 0` means
    /// unbounded.
    pub fn new(max_size_mb: usize) -> Self {
        Self {
            max_size_bytes: max_size_mb * 1024 * 1024,
            entries: RwLock::new(IndexMap::new()),
        }
    }

    /// Return the cached entry for `key` iff present and unexpired,
    /// atomically incrementing its hit count and marking it most-recently-used.
    pub async fn get(&self, key: &str) -> Option<CacheEntry> {
        let mut entries = self.entries.write().await;
        let now = Utc::now();
        let expired = matches!(entries.get(key), Some(slot) if now >= slot.entry.expires_at);
        if expired {
            entries.shift_remove(key);
            return None;
        }
        let slot = entries.get_mut(key)?;
        slot.entry.hit_count += 1;
        let entry = slot.entry.clone();
        entries.shift_remove(key);
        let size_bytes = entry.response.len();
        entries.insert(key.to_string(), Slot { entry: entry.clone(), size_bytes });
        Some(entry)
    }

    /// Save `response` under `key` with a TTL derived from `task_type`'s
    /// class, evicting least-recently-used entries if the size budget is
    /// exceeded.
    pub async fn save(&self, key: &str, response: String, tokens: u64, cost: f64, task_type: &str) {
        let ttl = ttl_for(TaskClass::classify(task_type));
        let now = Utc::now();
        let entry = CacheEntry {
            response,
            tokens,
            cost,
            cached_at: now,
            expires_at: now + chrono::Duration::from_std(ttl).unwrap_or_default(),
            hit_count: 0,
        };
        self.insert(key, entry).await;
    }

    async fn insert(&self, key: &str, entry: CacheEntry) {
        let size_bytes = entry.response.len();
        let mut entries = self.entries.write().await;
        entries.shift_remove(key);
        entries.insert(key.to_string(), Slot { entry, size_bytes });
        self.evict_if_needed(&mut entries);
    }

    fn evict_if_needed(&self, entries: &mut IndexMap<String, Slot>) {
        if self.max_size_bytes == 0 {
            return;
        }
        let mut total: usize = entries.values().map(|s| s.size_bytes).sum();
        while total > self.max_size_bytes {
            match entries.shift_remove_index(0) {
                Some((_, slot)) => total -= slot.size_bytes,
                None => break,
            }
        }
    }

    /// Remove every entry whose TTL has elapsed. `get` already ignores
    /// expired entries lazily; this is the explicit sweep for callers that
    /// want to reclaim memory proactively.
    pub async fn clear_expired(&self) {
        let now = Utc::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, slot| now < slot.entry.expires_at);
    }

    /// Number of entries currently held, expired or not.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the cache currently holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
