//! Sync Operation Module
//!
//! Mutating calls captured for later replay.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// == Method ==
/// Mutating HTTP verb of a queued call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            other => Err(format!("'{}' is not a mutating method", other)),
        }
    }
}

// == Operation Target ==
/// Resource plus verb of the call to replay.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationTarget {
    pub method: Method,
    /// Path relative to the upstream base URL, e.g. `/api/suppliers/42`
    pub resource: String,
}

impl OperationTarget {
    pub fn new(method: Method, resource: impl Into<String>) -> Self {
        Self {
            method,
            resource: resource.into(),
        }
    }
}

impl fmt::Display for OperationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.resource)
    }
}

// == New Operation ==
/// What callers hand to `SyncQueue::enqueue`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOperation {
    pub target: OperationTarget,
    pub payload: Option<Value>,
    /// Overrides the queue's default retry ceiling
    pub max_attempts: Option<u32>,
}

impl NewOperation {
    pub fn new(method: Method, resource: impl Into<String>) -> Self {
        Self {
            target: OperationTarget::new(method, resource),
            payload: None,
            max_attempts: None,
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }
}

// == Sync Operation ==
/// A queued mutation and its retry bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncOperation {
    pub id: String,
    pub target: OperationTarget,
    pub payload: Option<Value>,
    /// First enqueue time (Unix milliseconds); not touched by retries
    pub enqueued_at: u64,
    pub attempt_count: u32,
    pub max_attempts: u32,
    /// Earliest time the next attempt may run (Unix milliseconds)
    #[serde(default)]
    pub next_attempt_at: Option<u64>,
    #[serde(default)]
    pub last_error: Option<String>,
}

impl SyncOperation {
    /// Materializes a fresh operation with a new id and zero attempts.
    pub fn from_new(op: NewOperation, default_max_attempts: u32, now_ms: u64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            target: op.target,
            payload: op.payload,
            enqueued_at: now_ms,
            attempt_count: 0,
            max_attempts: op.max_attempts.unwrap_or(default_max_attempts).max(1),
            next_attempt_at: None,
            last_error: None,
        }
    }

    /// Whether the retry budget is spent.
    pub fn is_exhausted(&self) -> bool {
        self.attempt_count >= self.max_attempts
    }

    /// Whether backoff still holds this operation back at `now_ms`.
    pub fn is_backing_off(&self, now_ms: u64) -> bool {
        self.next_attempt_at.is_some_and(|at| at > now_ms)
    }
}

// == Exhausted Operation ==
/// Report sent on the exhaustion channel when an operation is dropped for good.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExhaustedOperation {
    pub operation: SyncOperation,
    /// Error of the final attempt
    pub error: String,
}
