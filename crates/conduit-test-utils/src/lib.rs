//! Test utilities for conduit crates.
//!
//! [`ScriptedTransport`] replays a queue of canned outcomes and records every
//! request it sees, so retry and polling behavior can be asserted without a
//! network. Latency and sleeps go through `tokio::time`, which makes them
//! deterministic under `#[tokio::test(start_paused = true)]`.

use async_trait::async_trait;
use conduit_common_http::{AttemptTimeout, HttpRequest, HttpResponse, Transport, TransportError};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// One queued outcome.
#[derive(Debug)]
pub enum Outcome {
    Respond(HttpResponse),
    Fail(TransportError),
}

#[derive(Debug)]
struct Step {
    outcome: Outcome,
    latency: Duration,
}

/// A request as observed by the transport.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub request: HttpRequest,
    pub timeout: AttemptTimeout,
    /// Virtual time at which the attempt started.
    pub at: Instant,
}

/// Transport that replays scripted outcomes in order.
///
/// Once the script is drained the `fallback` response is returned for every
/// further call; without a fallback the call fails with an invalid-request
/// error, which no retry policy retries.
#[derive(Debug)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Step>>,
    fallback: Option<HttpResponse>,
    latency: Duration,
    requests: Mutex<Vec<RecordedRequest>>,
    sleeps: Mutex<Vec<Duration>>,
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedTransport {
    /// Create an empty script.
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: None,
            latency: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    /// Latency applied to every step that does not set its own.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Queue a response.
    pub fn respond(self, response: HttpResponse) -> Self {
        let latency = self.latency;
        self.push(Outcome::Respond(response), latency)
    }

    /// Queue a response delivered after `latency`.
    pub fn respond_after(self, latency: Duration, response: HttpResponse) -> Self {
        self.push(Outcome::Respond(response), latency)
    }

    /// Queue a bare status response `count` times.
    pub fn respond_status(mut self, status: u16, count: usize) -> Self {
        for _ in 0..count {
            self = self.respond(HttpResponse::new(status));
        }
        self
    }

    /// Queue a failure.
    pub fn fail(self, error: TransportError) -> Self {
        let latency = self.latency;
        self.push(Outcome::Fail(error), latency)
    }

    /// Queue a failure raised after `latency`.
    pub fn fail_after(self, latency: Duration, error: TransportError) -> Self {
        self.push(Outcome::Fail(error), latency)
    }

    /// Response returned once the script is drained.
    pub fn then_always(mut self, response: HttpResponse) -> Self {
        self.fallback = Some(response);
        self
    }

    fn push(self, outcome: Outcome, latency: Duration) -> Self {
        self.script.lock().push_back(Step { outcome, latency });
        self
    }

    /// Every request sent so far, in order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    /// Number of requests sent so far.
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// URLs of every request sent so far.
    pub fn urls(&self) -> Vec<String> {
        self.requests
            .lock()
            .iter()
            .map(|r| r.request.url.clone())
            .collect()
    }

    /// Every sleep requested through [`Transport::sleep`].
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().clone()
    }

    /// Sum of every requested sleep.
    pub fn total_slept(&self) -> Duration {
        self.sleeps.lock().iter().sum()
    }

    /// Steps not yet consumed.
    pub fn remaining(&self) -> usize {
        self.script.lock().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(
        &self,
        request: &HttpRequest,
        timeout: AttemptTimeout,
    ) -> Result<HttpResponse, TransportError> {
        self.requests.lock().push(RecordedRequest {
            request: request.clone(),
            timeout,
            at: Instant::now(),
        });

        let step = self.script.lock().pop_front();
        let Some(step) = step else {
            return match &self.fallback {
                Some(response) => {
                    if !self.latency.is_zero() {
                        tokio::time::sleep(self.latency).await;
                    }
                    Ok(response.clone())
                }
                None => Err(TransportError::invalid_request(format!(
                    "no scripted outcome left for {} {}",
                    request.method, request.url
                ))),
            };
        };

        if !step.latency.is_zero() {
            tokio::time::sleep(step.latency).await;
        }

        match step.outcome {
            Outcome::Respond(response) => Ok(response),
            Outcome::Fail(error) => Err(error),
        }
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().push(duration);
        tokio::time::sleep(duration).await;
    }
}

/// A JSON response with the given status.
pub fn json_response(status: u16, body: serde_json::Value) -> HttpResponse {
    HttpResponse::new(status).with_json(&body)
}

/// Assert that a Result is Ok and return the value.
#[macro_export]
macro_rules! assert_ok {
    ($expr:expr) => {
        match $expr {
            Ok(v) => v,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
}

/// Assert that a Result is Err and return the error.
#[macro_export]
macro_rules! assert_err {
    ($expr:expr) => {
        match $expr {
            Ok(v) => panic!("Expected Err, got Ok: {:?}", v),
            Err(e) => e,
        }
    };
}
