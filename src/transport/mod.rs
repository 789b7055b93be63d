//! Transport Module
//!
//! The upstream seam: replays queued mutations and fetches prefetch data.
//!
//! Implementations must resolve or reject in bounded time. The queue also
//! wraps every call in its own execution timeout.

mod http;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::queue::SyncOperation;

pub use http::HttpTransport;

// == Transport Error ==
/// Why an upstream call did not succeed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Upstream answered with a non-success status
    #[error("upstream returned HTTP {status}")]
    Status { status: u16 },

    /// Connection-level failure
    #[error("network error: {0}")]
    Network(String),

    /// No answer within the allowed time
    #[error("timed out")]
    Timeout,

    /// The operation cannot be sent at all
    #[error("rejected: {0}")]
    Rejected(String),
}

impl TransportError {
    /// Whether a later attempt can succeed.
    ///
    /// Connection failures, timeouts, 5xx, 408, 409 and 429 are transient.
    /// Any other status means the upstream refused this request for good.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Network(_) | TransportError::Timeout => true,
            TransportError::Status { status } => {
                *status >= 500 || matches!(status, 408 | 409 | 429)
            }
            TransportError::Rejected(_) => false,
        }
    }
}

// == Transport Trait ==
#[async_trait]
pub trait Transport: Send + Sync {
    /// Replays one mutating operation upstream.
    async fn execute(&self, operation: &SyncOperation) -> Result<(), TransportError>;

    /// Fetches the current value of a cacheable resource.
    async fn fetch(&self, key: &str) -> Result<Value, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors_are_retryable() {
        assert!(TransportError::Network("reset".to_string()).is_retryable());
        assert!(TransportError::Timeout.is_retryable());
        for status in [408, 409, 429, 500, 502, 503, 504] {
            assert!(TransportError::Status { status }.is_retryable(), "{}", status);
        }
    }

    #[test]
    fn test_client_errors_are_final() {
        for status in [400, 401, 403, 404, 410, 413, 422] {
            assert!(!TransportError::Status { status }.is_retryable(), "{}", status);
        }
        assert!(!TransportError::Rejected("bad url".to_string()).is_retryable());
    }
}
