//! Shared HTTP client and the per-step retry policy used by board sessions

use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::{HttpSettings, RetrySettings};
use crate::error::BoardError;

pub type Result<T> = std::result::Result<T, BoardError>;

/// Retry policy applied to one network step (authentication, one page, one lookup)
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(1),
        }
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            backoff: settings.backoff.as_duration(),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no waiting
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::ZERO,
        }
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or attempts
    /// are exhausted. The last error is returned unchanged.
    pub async fn run<T, F, Fut>(&self, step: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempts = 0;

        loop {
            attempts += 1;

            match op().await {
                Ok(value) => {
                    if attempts > 1 {
                        debug!(step, attempts, "Step succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    if attempts >= self.max_attempts {
                        warn!(step, attempts, error = %e, "Step failed after retries");
                        return Err(e);
                    }

                    warn!(step, attempts, error = %e, "Step failed, retrying");

                    // Exponential backoff: b, 2b, 4b, ...
                    let backoff = self.backoff.saturating_mul(2u32.saturating_pow(attempts - 1));
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

/// HTTP client shared by every board session of a process
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    retry: RetryPolicy,
}

impl HttpClient {
    pub fn new(settings: &HttpSettings, retry: RetryPolicy) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(settings.connect_timeout.as_duration())
            .timeout(settings.request_timeout.as_duration())
            .user_agent(&settings.user_agent)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| BoardError::Transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client, retry })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }
}

/// Fail with a transport error unless the response status is a success
pub fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    Err(BoardError::Transport(describe_status(status)))
}

/// Decode a successful JSON response body
pub async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let response = ensure_success(response)?;
    let bytes = response.bytes().await?;
    debug!(size = bytes.len(), "Response received");
    Ok(serde_json::from_slice(&bytes)?)
}

pub fn describe_status(status: StatusCode) -> String {
    format!(
        "HTTP {}: {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("Unknown")
    )
}
