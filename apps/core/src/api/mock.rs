//! Scripted transport and recording sleeper.
//!
//! Used by the test suites to drive the client without network access.

use super::transport::{HttpResponse, Sleeper, Transport, TransportError};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::time::Duration;

/// One request seen by [`ScriptedTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub url: String,
    pub token: String,
    pub params: Vec<(String, String)>,
    pub timeout: Duration,
}

impl RecordedCall {
    /// Value of a query parameter, if sent.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Replays queued outcomes in order and records every call.
///
/// Once the queue is empty every call fails with a connection error.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    outcomes: RefCell<VecDeque<Result<HttpResponse, String>>>,
    calls: RefCell<Vec<RecordedCall>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response with the given status and body.
    pub fn respond(self, status: u16, body: impl Into<String>) -> Self {
        self.outcomes
            .borrow_mut()
            .push_back(Ok(HttpResponse::new(status, body)));
        self
    }

    /// Queue a 200 response carrying `value` as JSON.
    pub fn respond_json(self, value: &serde_json::Value) -> Self {
        self.respond(200, value.to_string())
    }

    /// Queue a network failure.
    pub fn fail(self, reason: impl Into<String>) -> Self {
        self.outcomes.borrow_mut().push_back(Err(reason.into()));
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.borrow().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }
}

impl Transport for ScriptedTransport {
    fn get(
        &self,
        url: &str,
        token: &str,
        params: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError> {
        self.calls.borrow_mut().push(RecordedCall {
            url: url.to_string(),
            token: token.to_string(),
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            timeout,
        });

        match self.outcomes.borrow_mut().pop_front() {
            Some(Ok(response)) => Ok(response),
            Some(Err(reason)) => Err(TransportError::Connection(reason)),
            None => Err(TransportError::Connection(
                "no scripted response left".to_string(),
            )),
        }
    }
}

/// Records requested sleeps instead of sleeping.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    sleeps: RefCell<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.borrow().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.sleeps.borrow_mut().push(duration);
    }
}
