//! Cache Entry Module
//!
//! Defines cache entries with TTL and eviction priority metadata.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// == Priority ==
/// Eviction priority tier. Never affects expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

impl Priority {
    /// Positive eviction weight; higher survives longer.
    pub fn weight(self) -> u32 {
        match self {
            Priority::Low => 1,
            Priority::Medium => 2,
            Priority::High => 3,
            Priority::Critical => 4,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        };
        f.write_str(name)
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "critical" => Ok(Priority::Critical),
            other => Err(format!("unknown priority '{}'", other)),
        }
    }
}

// == Cache Options ==
/// Per-insert options for `CacheStore::put`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheOptions {
    pub priority: Priority,
    /// Falls back to the store's default TTL when `None`
    pub ttl: Option<Duration>,
}

impl CacheOptions {
    pub fn new(priority: Priority, ttl: Duration) -> Self {
        Self {
            priority,
            ttl: Some(ttl),
        }
    }

    pub fn with_priority(priority: Priority) -> Self {
        Self {
            priority,
            ttl: None,
        }
    }
}

// == Cache Entry ==
/// A cached response body with its bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub payload: Value,
    /// Insertion timestamp (Unix milliseconds)
    pub created_at: u64,
    /// `created_at + ttl` (Unix milliseconds)
    pub expires_at: u64,
    pub priority: Priority,
    /// Serialized payload size, fixed at insertion
    pub size_bytes: usize,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates an entry stamped at `now_ms`.
    ///
    /// # Errors
    /// Fails only if the payload cannot be serialized to measure its size.
    pub fn new(
        key: String,
        payload: Value,
        priority: Priority,
        ttl: Duration,
        now_ms: u64,
    ) -> serde_json::Result<Self> {
        let size_bytes = payload_size(&payload)?;

        Ok(Self {
            key,
            payload,
            created_at: now_ms,
            expires_at: now_ms.saturating_add(duration_ms(ttl)),
            priority,
            size_bytes,
        })
    }

    // == Is Expired ==
    /// An entry is expired once `now >= expires_at`, i.e. as soon as the
    /// full TTL has elapsed.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at
    }

    /// Age in milliseconds, never below 1 so it can be used as a divisor.
    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.created_at).max(1)
    }
}

// == Utility Functions ==
/// Whole milliseconds in `duration`, saturating at `u64::MAX`.
pub(crate) fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Size of the JSON encoding of a payload.
pub fn payload_size(payload: &Value) -> serde_json::Result<usize> {
    Ok(serde_json::to_vec(payload)?.len())
}
