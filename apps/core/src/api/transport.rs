//! HTTP transport and sleep seams for the API client.
//!
//! The client only needs a status code and a body, so the transport returns
//! exactly that. Tests swap in scripted transports and recording sleepers.

use reqwest::header::AUTHORIZATION;
use std::time::Duration;
use thiserror::Error;

/// Status and body of one HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Network-level failure (no usable response).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("connection failed: {0}")]
    Connection(String),
}

/// Issues one authenticated GET.
pub trait Transport {
    fn get(
        &self,
        url: &str,
        token: &str,
        params: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError>;
}

/// Blocks the caller for a cooldown.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Transport backed by a blocking reqwest client.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("discord-export/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn get(
        &self,
        url: &str,
        token: &str,
        params: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError> {
        // Discord user tokens go in verbatim, without a "Bearer " prefix
        let response = self
            .client
            .get(url)
            .header(AUTHORIZATION, token)
            .query(params)
            .timeout(timeout)
            .send()?;

        let status = response.status().as_u16();
        let body = response.text()?;
        Ok(HttpResponse { status, body })
    }
}

/// Sleeps the current thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
