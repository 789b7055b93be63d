//! Error types for the sync agent
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Sync Error Enum ==
/// Unified error type for the sync agent.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Key absent or expired (only surfaced by the HTTP layer)
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A single entry is larger than the whole cache budget
    #[error("Entry '{key}' is {size} bytes, cache capacity is {capacity} bytes")]
    CapacityOverflow {
        key: String,
        size: usize,
        capacity: usize,
    },

    /// Durable store read or write failed
    #[error("Persistence failure: {0}")]
    Persistence(String),

    /// Snapshot or payload could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// == IntoResponse Implementation ==
impl IntoResponse for SyncError {
    fn into_response(self) -> Response {
        let status = match &self {
            SyncError::NotFound(_) => StatusCode::NOT_FOUND,
            SyncError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            SyncError::CapacityOverflow { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            SyncError::Persistence(_) | SyncError::Serialization(_) | SyncError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the sync agent.
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (SyncError::NotFound("k".into()), StatusCode::NOT_FOUND),
            (SyncError::InvalidRequest("bad".into()), StatusCode::BAD_REQUEST),
            (
                SyncError::CapacityOverflow {
                    key: "k".into(),
                    size: 10,
                    capacity: 5,
                },
                StatusCode::PAYLOAD_TOO_LARGE,
            ),
            (
                SyncError::Persistence("disk".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn test_capacity_overflow_message() {
        let err = SyncError::CapacityOverflow {
            key: "big".into(),
            size: 2048,
            capacity: 1024,
        };
        assert_eq!(
            err.to_string(),
            "Entry 'big' is 2048 bytes, cache capacity is 1024 bytes"
        );
    }
}
