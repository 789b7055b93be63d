//! HTTP transport over reqwest.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::debug;

use crate::queue::{Method, SyncOperation};
use crate::transport::{Transport, TransportError};

/// Header carrying the operation id so upstream can drop replays it has
/// already applied.
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

// == Http Transport ==
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    /// Builds a transport for `base_url` whose requests give up after `timeout`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Rejected(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

fn map_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else if let Some(status) = e.status() {
        TransportError::Status {
            status: status.as_u16(),
        }
    } else {
        TransportError::Network(e.to_string())
    }
}

fn check_status(status: StatusCode) -> Result<(), TransportError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(TransportError::Status {
            status: status.as_u16(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, operation: &SyncOperation) -> Result<(), TransportError> {
        let url = self.url_for(&operation.target.resource);
        let request = match operation.target.method {
            Method::Post => self.client.post(&url),
            Method::Put => self.client.put(&url),
            Method::Patch => self.client.patch(&url),
            Method::Delete => self.client.delete(&url),
        }
        .header(IDEMPOTENCY_HEADER, &operation.id);

        let request = match &operation.payload {
            Some(payload) => request.json(payload),
            None => request,
        };

        let response = request.send().await.map_err(map_error)?;
        debug!(
            "{} {} -> {}",
            operation.target.method,
            url,
            response.status()
        );
        check_status(response.status())
    }

    async fn fetch(&self, key: &str) -> Result<Value, TransportError> {
        let url = self.url_for(key);
        let response = self.client.get(&url).send().await.map_err(map_error)?;
        check_status(response.status())?;
        response.json::<Value>().await.map_err(map_error)
    }
}
