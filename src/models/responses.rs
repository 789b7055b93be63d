//! Response DTOs for the control API
//!
//! Defines the structure of outgoing HTTP response bodies.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::cache::{CacheEntry, CacheStats, Priority};
use crate::clock::to_datetime;
use crate::connectivity::ConnectionQuality;
use crate::manager::ManagerStatus;
use crate::queue::SyncOperation;

/// Response body for PUT /cache
#[derive(Debug, Clone, Serialize)]
pub struct PutCacheResponse {
    pub key: String,
    pub priority: Priority,
    pub size_bytes: usize,
    pub expires_at: Option<DateTime<Utc>>,
    /// Keys evicted to make room, in eviction order
    pub evicted: Vec<String>,
}

impl PutCacheResponse {
    pub fn new(entry: &CacheEntry, evicted: Vec<String>) -> Self {
        Self {
            key: entry.key.clone(),
            priority: entry.priority,
            size_bytes: entry.size_bytes,
            expires_at: to_datetime(entry.expires_at),
            evicted,
        }
    }
}

/// Response body for GET /cache/:key
#[derive(Debug, Clone, Serialize)]
pub struct CacheValueResponse {
    pub key: String,
    pub value: Value,
}

impl CacheValueResponse {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Response body for GET /cache/:key/exists
#[derive(Debug, Clone, Serialize)]
pub struct ExistsResponse {
    pub key: String,
    pub exists: bool,
}

/// Response body for DELETE /cache/:key
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    /// Success message
    pub message: String,
    /// The key that was deleted
    pub key: String,
}

impl DeleteResponse {
    /// Creates a new DeleteResponse
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' deleted successfully", key),
            key,
        }
    }
}

/// Response body for DELETE /cache and DELETE /queue
#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    pub message: String,
    /// Number of items dropped
    pub cleared: usize,
}

impl ClearResponse {
    pub fn new(what: &str, cleared: usize) -> Self {
        Self {
            message: format!("Cleared {} {}", cleared, what),
            cleared,
        }
    }
}

/// Response body for GET /queue
#[derive(Debug, Clone, Serialize)]
pub struct QueueResponse {
    pub length: usize,
    pub draining: bool,
    pub operations: Vec<SyncOperation>,
}

/// Response body for POST /queue
#[derive(Debug, Clone, Serialize)]
pub struct EnqueueResponse {
    pub id: String,
    pub queue_length: usize,
}

/// Response body for POST /connectivity
#[derive(Debug, Clone, Serialize)]
pub struct ConnectivityResponse {
    pub is_online: bool,
    pub quality: ConnectionQuality,
    /// Whether the report flipped the online state
    pub changed: bool,
}

/// Response body for GET /status
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    #[serde(flatten)]
    pub status: ManagerStatus,
    pub cache_stats: CacheStats,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl StatusResponse {
    pub fn new(status: ManagerStatus, cache_stats: CacheStats) -> Self {
        let hit_rate = cache_stats.hit_rate();
        Self {
            status,
            cache_stats,
            hit_rate,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}
