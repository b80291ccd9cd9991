//! HTTP client for the external test executor.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::bundle::RunBundle;
use super::report::Report;
use super::RunError;

const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Extra time the in-flight call gets past the executor timeout before it is
/// force-aborted.
const GRACE: Duration = Duration::from_secs(5);

/// Immutable executor endpoint configuration, built once at startup.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl ExecutorConfig {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let timeout = if timeout.is_zero() {
            Duration::from_secs(DEFAULT_TIMEOUT_SECS)
        } else {
            timeout
        };
        Self {
            base_url: base_url.into(),
            timeout,
        }
    }
}

/// Outcome of one executor invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<Report>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Executor response status; absent when the transport call itself failed.
    #[serde(skip)]
    pub http_status: Option<u16>,
}

impl ExecutionEnvelope {
    /// Envelope for a transport-level failure: only `error` is populated.
    pub fn transport_failure(reason: impl Into<String>) -> Self {
        Self {
            error: Some(reason.into()),
            ..Default::default()
        }
    }

    pub fn report_json(&self) -> Option<String> {
        self.report
            .as_ref()
            .and_then(|r| serde_json::to_string(r).ok())
    }
}

/// Synchronous-from-the-caller's-perspective client for the executor's
/// `POST /run` endpoint. One bounded round trip, no retries.
pub struct ExecutionClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl ExecutionClient {
    pub fn new(config: ExecutorConfig) -> Self {
        Self {
            client: Client::builder()
                .build()
                .expect("Failed to build HTTP client"),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: config.timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send one bundle to the executor and return its envelope.
    ///
    /// Transport failures (connection refused, timeout expiry, undecodable
    /// body) never surface raw; they come back as `ExecutorUnavailable`.
    /// An executor error status with no error text is back-filled with the
    /// status line.
    pub async fn execute(&self, bundle: &RunBundle) -> Result<ExecutionEnvelope, RunError> {
        let url = format!("{}/run", self.base_url);

        let request = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(bundle)
            .send();

        let response = tokio::time::timeout(self.timeout + GRACE, request)
            .await
            .map_err(|_| RunError::ExecutorUnavailable {
                reason: format!("executor call exceeded {}s timeout", self.timeout.as_secs()),
            })?
            .map_err(|e| RunError::ExecutorUnavailable {
                reason: format!("failed to invoke executor at {}: {}", url, e),
            })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| RunError::ExecutorUnavailable {
                reason: format!("failed to read executor response: {}", e),
            })?;

        let mut envelope: ExecutionEnvelope = if body.is_empty() {
            ExecutionEnvelope::default()
        } else {
            serde_json::from_slice(&body).map_err(|e| RunError::ExecutorUnavailable {
                reason: format!("undecodable executor response: {}", e),
            })?
        };

        envelope.http_status = Some(status.as_u16());
        let blank_error = envelope
            .error
            .as_deref()
            .map_or(true, |e| e.trim().is_empty());
        if !status.is_success() && blank_error {
            envelope.error = Some(status.to_string());
        }

        Ok(envelope)
    }
}
