//! Rate-limited Discord API client.
//!
//! Every call is retried up to `max_retries` times. A 429 response makes
//! the client wait for the server's `retry_after` plus one second before
//! the next attempt. Other failures retry immediately.

use super::transport::{HttpTransport, Sleeper, ThreadSleeper, Transport, TransportError};
use crate::config::Config;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Margin added on top of the server's `retry_after`.
pub const RATE_LIMIT_MARGIN: Duration = Duration::from_secs(1);

/// Failure of a logical API call.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request to {endpoint} failed after {attempts} attempts")]
    RetriesExhausted { endpoint: String, attempts: u32 },
}

/// Authenticated client for the Discord REST API.
pub struct ApiClient<T = HttpTransport, S = ThreadSleeper> {
    transport: T,
    sleeper: S,
    token: String,
    api_base: String,
    timeout: Duration,
    max_retries: u32,
}

impl ApiClient {
    /// Client using real HTTP and real sleeps.
    pub fn new(token: &str, config: &Config) -> Result<Self, TransportError> {
        Ok(Self::with_transport(
            token,
            config,
            HttpTransport::new()?,
            ThreadSleeper,
        ))
    }
}

impl<T: Transport, S: Sleeper> ApiClient<T, S> {
    pub fn with_transport(token: &str, config: &Config, transport: T, sleeper: S) -> Self {
        Self {
            transport,
            sleeper,
            token: token.to_string(),
            api_base: config.api_base(),
            timeout: config.request_timeout(),
            max_retries: config.max_retries,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn sleeper(&self) -> &S {
        &self.sleeper
    }

    /// GET `endpoint`, returning `None` once retries are exhausted.
    ///
    /// `None` does not tell "empty" apart from "failed"; use
    /// [`ApiClient::try_get`] when the difference matters.
    pub fn get(&self, endpoint: &str, params: &[(&str, &str)]) -> Option<Value> {
        match self.try_get(endpoint, params) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!("{}", err);
                None
            }
        }
    }

    /// GET `endpoint` with retries, reporting exhaustion as an error.
    pub fn try_get(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<Value, ApiError> {
        let url = format!("{}{}", self.api_base, endpoint);
        let mut retries = 0;

        loop {
            debug!("Requesting {}, {:?}", endpoint, params);

            match self.transport.get(&url, &self.token, params, self.timeout) {
                Ok(response) if response.status == 200 => {
                    match serde_json::from_str(&response.body) {
                        Ok(value) => return Ok(value),
                        Err(e) => warn!("Invalid JSON from {}: {}", endpoint, e),
                    }
                }
                Ok(response) if response.status == 429 => {
                    let wait = rate_limit_wait(&response.body);
                    warn!(
                        "Rate limit exceeded, waiting {:.2} seconds",
                        wait.as_secs_f64()
                    );
                    self.sleeper.sleep(wait);
                }
                Ok(response) => debug!("{} returned HTTP {}", endpoint, response.status),
                Err(e) => warn!("Request to {} failed: {}", endpoint, e),
            }

            if retries >= self.max_retries {
                return Err(ApiError::RetriesExhausted {
                    endpoint: endpoint.to_string(),
                    attempts: retries + 1,
                });
            }
            retries += 1;
            debug!(
                "Retrying request to {} ({}/{})",
                endpoint, retries, self.max_retries
            );
        }
    }
}

/// Cooldown for a 429 body: `retry_after` seconds plus the margin.
///
/// A missing or unusable `retry_after` counts as zero.
pub fn rate_limit_wait(body: &str) -> Duration {
    let retry_after = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("retry_after").and_then(Value::as_f64))
        .filter(|secs| secs.is_finite() && *secs > 0.0)
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .unwrap_or(Duration::ZERO);
    retry_after.saturating_add(RATE_LIMIT_MARGIN)
}
