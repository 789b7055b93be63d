//! Health-check connectivity signal.
//!
//! Periodically sends `HEAD` to an upstream health endpoint. Any answer
//! within the timeout means online; answers slower than
//! [`SLOW_RESPONSE`] are reported as `Poor`.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::debug;

use crate::connectivity::{ConnectionQuality, ConnectivitySignal};

/// Latency above which the link is reported as poor.
pub const SLOW_RESPONSE: Duration = Duration::from_millis(1000);

// == Health Probe ==
#[derive(Debug, Clone)]
pub struct HealthProbe {
    client: reqwest::Client,
    url: String,
    interval: Duration,
    timeout: Duration,
    started: bool,
}

impl HealthProbe {
    /// Probes `url` every `interval`, giving each request `timeout`.
    /// The first probe runs immediately.
    pub fn new(url: impl Into<String>, interval: Duration, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            interval,
            timeout,
            started: false,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    // == Probe Once ==
    /// Runs a single health check.
    pub async fn probe(&self) -> ConnectionQuality {
        let started = Instant::now();
        let result = self
            .client
            .head(&self.url)
            .timeout(self.timeout)
            .send()
            .await;

        match result {
            Ok(response) => {
                let elapsed = started.elapsed();
                debug!(
                    "Health probe {} answered {} in {:?}",
                    self.url,
                    response.status(),
                    elapsed
                );
                if elapsed < SLOW_RESPONSE {
                    ConnectionQuality::Good
                } else {
                    ConnectionQuality::Poor
                }
            }
            Err(e) => {
                debug!("Health probe {} failed: {}", self.url, e);
                ConnectionQuality::Offline
            }
        }
    }
}

#[async_trait]
impl ConnectivitySignal for HealthProbe {
    async fn next(&mut self) -> Option<ConnectionQuality> {
        if self.started {
            tokio::time::sleep(self.interval).await;
        }
        self.started = true;
        Some(self.probe().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::get, Router};

    async fn spawn_health_server() -> String {
        let app = Router::new().route("/api/health", get(|| async { "ok" }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/api/health", addr)
    }

    #[tokio::test]
    async fn test_probe_reachable_is_good() {
        let url = spawn_health_server().await;
        let probe = HealthProbe::new(url, Duration::from_secs(30), Duration::from_secs(5));
        assert_eq!(probe.probe().await, ConnectionQuality::Good);
    }

    #[tokio::test]
    async fn test_probe_unreachable_is_offline() {
        // Bind then drop to get a port nothing listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut probe = HealthProbe::new(
            format!("http://{}/api/health", addr),
            Duration::from_secs(30),
            Duration::from_millis(500),
        );
        assert_eq!(probe.next().await, Some(ConnectionQuality::Offline));
    }
}
