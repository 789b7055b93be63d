//! Request DTOs for the control API
//!
//! Defines the structure of incoming HTTP request bodies.

use std::time::Duration;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::cache::{CacheOptions, Priority, MAX_KEY_LENGTH};
use crate::connectivity::ConnectionQuality;
use crate::queue::{Method, NewOperation};

/// Request body for PUT /cache
///
/// # Fields
/// - `key`: Resource identifier the value is cached under
/// - `value`: Any JSON payload
/// - `priority`: Eviction priority (default: medium)
/// - `ttl`: Optional TTL in seconds (uses default if not specified)
#[derive(Debug, Clone, Deserialize)]
pub struct PutCacheRequest {
    pub key: String,
    pub value: Value,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub ttl: Option<u64>,
}

impl PutCacheRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        validate_key(&self.key)
    }

    pub fn options(&self) -> CacheOptions {
        match self.ttl {
            Some(secs) => CacheOptions::new(self.priority, Duration::from_secs(secs)),
            None => CacheOptions::with_priority(self.priority),
        }
    }
}

/// Request body for POST /queue
#[derive(Debug, Clone, Deserialize)]
pub struct EnqueueRequest {
    pub method: Method,
    pub resource: String,
    #[serde(default)]
    pub payload: Option<Value>,
    /// Overrides the configured retry ceiling
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

impl EnqueueRequest {
    pub fn validate(&self) -> Option<String> {
        if self.resource.trim().is_empty() {
            return Some("Resource cannot be empty".to_string());
        }
        if self.max_attempts == Some(0) {
            return Some("max_attempts must be at least 1".to_string());
        }
        None
    }

    pub fn into_operation(self) -> NewOperation {
        let mut op = NewOperation::new(self.method, self.resource);
        if let Some(payload) = self.payload {
            op = op.with_payload(payload);
        }
        if let Some(max_attempts) = self.max_attempts {
            op = op.with_max_attempts(max_attempts);
        }
        op
    }
}

/// Request body for POST /connectivity
///
/// Either a plain `online` flag or a full `quality` report.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectivityRequest {
    #[serde(default)]
    pub online: Option<bool>,
    #[serde(default)]
    pub quality: Option<ConnectionQuality>,
}

impl ConnectivityRequest {
    pub fn validate(&self) -> Option<String> {
        match (self.online, self.quality) {
            (None, None) => Some("Either 'online' or 'quality' is required".to_string()),
            (Some(online), Some(quality)) if online != quality.is_online() => {
                Some(format!("'online: {}' contradicts quality '{}'", online, quality))
            }
            _ => None,
        }
    }

    /// Reported quality; `None` only for requests that fail validation.
    pub fn quality(&self) -> Option<ConnectionQuality> {
        self.quality
            .or_else(|| self.online.map(ConnectionQuality::from_online))
    }
}

/// Query string for DELETE /cache
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClearCacheQuery {
    /// Only drop keys matching this regular expression
    pub pattern: Option<String>,
}

impl ClearCacheQuery {
    /// Compiled `pattern`, if one was given.
    pub fn regex(&self) -> Result<Option<Regex>, String> {
        self.pattern
            .as_deref()
            .map(|p| Regex::new(p).map_err(|e| format!("invalid pattern: {}", e)))
            .transpose()
    }
}

/// Request body for POST /prefetch
#[derive(Debug, Clone, Deserialize)]
pub struct PrefetchRequest {
    pub keys: Vec<String>,
}

impl PrefetchRequest {
    pub fn validate(&self) -> Option<String> {
        if self.keys.is_empty() {
            return Some("At least one key is required".to_string());
        }
        self.keys.iter().find_map(|key| validate_key(key))
    }
}

fn validate_key(key: &str) -> Option<String> {
    if key.is_empty() {
        return Some("Key cannot be empty".to_string());
    }
    if key.len() > MAX_KEY_LENGTH {
        return Some(format!(
            "Key exceeds maximum length of {} characters",
            MAX_KEY_LENGTH
        ));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_clear_cache_query_pattern() {
        assert!(ClearCacheQuery::default().regex().unwrap().is_none());

        let query = ClearCacheQuery {
            pattern: Some("^/api/".to_string()),
        };
        assert!(query.regex().unwrap().unwrap().is_match("/api/items"));

        let query = ClearCacheQuery {
            pattern: Some("[".to_string()),
        };
        assert!(query.regex().unwrap_err().starts_with("invalid pattern"));
    }

    #[test]
    fn test_put_request_deserialize() {
        let json = r#"{"key": "/api/items", "value": {"id": 1}}"#;
        let req: PutCacheRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.key, "/api/items");
        assert_eq!(req.value, json!({"id": 1}));
        assert_eq!(req.priority, Priority::Medium);
        assert!(req.ttl.is_none());
        assert_eq!(req.options().ttl, None);
    }

    #[test]
    fn test_put_request_with_ttl_and_priority() {
        let json = r#"{"key": "k", "value": "v", "priority": "critical", "ttl": 60}"#;
        let req: PutCacheRequest = serde_json::from_str(json).unwrap();
        assert_eq!(
            req.options(),
            CacheOptions::new(Priority::Critical, Duration::from_secs(60))
        );
    }

    #[test]
    fn test_validate_empty_key() {
        let req = PutCacheRequest {
            key: "".to_string(),
            value: json!(1),
            priority: Priority::Low,
            ttl: None,
        };
        assert!(req.validate().is_some());
    }

    #[test]
    fn test_validate_long_key() {
        let req = PutCacheRequest {
            key: "k".repeat(MAX_KEY_LENGTH + 1),
            value: json!(1),
            priority: Priority::Low,
            ttl: None,
        };
        assert!(req.validate().is_some());
    }

    #[test]
    fn test_enqueue_request_into_operation() {
        let json = r#"{"method": "PATCH", "resource": "/api/orders/4", "payload": {"qty": 2}, "max_attempts": 5}"#;
        let req: EnqueueRequest = serde_json::from_str(json).unwrap();
        assert!(req.validate().is_none());

        let op = req.into_operation();
        assert_eq!(op.target.method, Method::Patch);
        assert_eq!(op.target.resource, "/api/orders/4");
        assert_eq!(op.payload, Some(json!({"qty": 2})));
        assert_eq!(op.max_attempts, Some(5));
    }

    #[test]
    fn test_enqueue_request_validation() {
        let req = EnqueueRequest {
            method: Method::Post,
            resource: " ".to_string(),
            payload: None,
            max_attempts: None,
        };
        assert!(req.validate().is_some());

        let req = EnqueueRequest {
            method: Method::Post,
            resource: "/a".to_string(),
            payload: None,
            max_attempts: Some(0),
        };
        assert!(req.validate().is_some());
    }

    #[test]
    fn test_connectivity_request() {
        let req: ConnectivityRequest = serde_json::from_str(r#"{"online": false}"#).unwrap();
        assert!(req.validate().is_none());
        assert_eq!(req.quality(), Some(ConnectionQuality::Offline));

        let req: ConnectivityRequest = serde_json::from_str(r#"{"quality": "poor"}"#).unwrap();
        assert_eq!(req.quality(), Some(ConnectionQuality::Poor));

        let req: ConnectivityRequest = serde_json::from_str("{}").unwrap();
        assert!(req.validate().is_some());

        let req: ConnectivityRequest =
            serde_json::from_str(r#"{"online": true, "quality": "offline"}"#).unwrap();
        assert!(req.validate().is_some());
    }

    #[test]
    fn test_prefetch_request_validation() {
        let req = PrefetchRequest { keys: vec![] };
        assert!(req.validate().is_some());

        let req = PrefetchRequest {
            keys: vec!["/api/a".to_string(), "".to_string()],
        };
        assert!(req.validate().is_some());
    }
}
