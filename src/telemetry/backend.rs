//! Poll-channel client: `TelemetryBackend` trait and its `reqwest` implementation.
//!
//! [`HttpBackend`] talks to the inference backend's REST surface:
//!
//! | Call                  | Endpoint                  |
//! |-----------------------|---------------------------|
//! | `fetch_combined`      | `GET  /combined_data`     |
//! | `health`              | `GET  /health`            |
//! | `reset_calibration`   | `POST /reset_calibration` |
//!
//! Nothing is retried here.  The poll timer's next tick is the retry.

use std::time::Instant;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::config::BackendConfig;

use super::payload::{PayloadError, PollPayload};

// ---------------------------------------------------------------------------
// TransportError
// ---------------------------------------------------------------------------

/// Failure of a single request on the poll channel.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection refused, DNS failure, reset, ...
    #[error("HTTP request failed: {0}")]
    Request(String),

    #[error("request timed out")]
    Timeout,

    /// The backend answered with a non-success status (e.g. 503 while its
    /// model is not loaded).
    #[error("backend returned HTTP {0}")]
    Status(u16),

    /// The response arrived but its body could not be decoded.
    #[error(transparent)]
    Malformed(#[from] PayloadError),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else {
            TransportError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// HealthReport
// ---------------------------------------------------------------------------

/// Reachability of the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkStatus {
    Online,
    #[default]
    Offline,
}

/// Result of a health check: latency and backend version.  Display only.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HealthReport {
    pub status: LinkStatus,
    pub latency_ms: u64,
    pub version: String,
}

impl HealthReport {
    pub fn offline() -> Self {
        Self {
            status: LinkStatus::Offline,
            latency_ms: 0,
            version: String::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct HealthBody {
    service: Option<String>,
}

// ---------------------------------------------------------------------------
// TelemetryBackend trait
// ---------------------------------------------------------------------------

/// Request/response side of the backend.
///
/// Implementors must be `Send + Sync` so they can be shared as
/// `Arc<dyn TelemetryBackend>` between the poll timer and the UI command
/// handler.
#[async_trait]
pub trait TelemetryBackend: Send + Sync {
    /// Fetch one full-state snapshot.
    async fn fetch_combined(&self) -> Result<PollPayload, TransportError>;

    /// Measure latency and read the backend version.  Never fails; an
    /// unreachable backend yields [`HealthReport::offline`].
    async fn health(&self) -> HealthReport;

    /// Ask the backend to restart its calibration.
    async fn reset_calibration(&self) -> Result<(), TransportError>;
}

// ---------------------------------------------------------------------------
// HttpBackend
// ---------------------------------------------------------------------------

/// `reqwest`-based [`TelemetryBackend`].
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    /// Build an `HttpBackend` from the backend config.
    ///
    /// The HTTP client carries the per-request timeout; a default client is
    /// used if the builder fails.
    pub fn from_config(config: &BackendConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl TelemetryBackend for HttpBackend {
    async fn fetch_combined(&self) -> Result<PollPayload, TransportError> {
        let response = self.client.get(self.url("/combined_data")).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        Ok(PollPayload::parse(&body)?)
    }

    async fn health(&self) -> HealthReport {
        let start = Instant::now();
        let result = self.client.get(self.url("/health")).send().await;

        let response = match result {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                log::debug!("health check: HTTP {}", r.status());
                return HealthReport::offline();
            }
            Err(e) => {
                log::debug!("health check failed: {e}");
                return HealthReport::offline();
            }
        };

        let latency_ms = start.elapsed().as_millis() as u64;
        let version = response
            .json::<HealthBody>()
            .await
            .ok()
            .and_then(|b| b.service)
            .unwrap_or_else(|| "unknown".into());

        HealthReport {
            status: LinkStatus::Online,
            latency_ms,
            version,
        }
    }

    async fn reset_calibration(&self) -> Result<(), TransportError> {
        let response = self
            .client
            .post(self.url("/reset_calibration"))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(TransportError::Status(status.as_u16()))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_config_builds_without_panic() {
        let _backend = HttpBackend::from_config(&BackendConfig::default());
    }

    #[test]
    fn urls_join_cleanly() {
        let mut config = BackendConfig::default();
        config.base_url = "http://example.test:5000/".into();
        let backend = HttpBackend::from_config(&config);
        assert_eq!(
            backend.url("/combined_data"),
            "http://example.test:5000/combined_data"
        );
        assert_eq!(backend.url("health"), "http://example.test:5000/health");
    }

    /// Verify that `HttpBackend` is object-safe (usable as `dyn TelemetryBackend`).
    #[test]
    fn backend_is_object_safe() {
        let backend: Box<dyn TelemetryBackend> =
            Box::new(HttpBackend::from_config(&BackendConfig::default()));
        drop(backend);
    }

    /// Nothing listens on port 9 of the loopback; the call must fail as a
    /// transport error rather than panic.
    #[tokio::test]
    async fn unreachable_backend_is_transport_error() {
        let mut config = BackendConfig::default();
        config.base_url = "http://127.0.0.1:9".into();
        config.request_timeout_ms = 500;
        let backend = HttpBackend::from_config(&config);

        let err = backend.fetch_combined().await.expect_err("no server");
        assert!(matches!(
            err,
            TransportError::Request(_) | TransportError::Timeout
        ));
        assert_eq!(backend.health().await.status, LinkStatus::Offline);
    }
}
