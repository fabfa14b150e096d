//! The retry loop.

use conduit_common_async::{sleep_or_cancel, CancelHandle};
use conduit_common_config::RetryConfig;
use conduit_common_http::{HttpRequest, HttpResponse, Transport, TransportError};
use conduit_common_log::spans::{attempt_span, record_error, request_span, Instrument};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::classify::{is_method_retryable, is_retry};
use crate::error::{LastOutcome, PipelineError};
use crate::retry_after::parse_retry_after;
use crate::settings::{RetryOptions, RetrySettings};
use crate::state::{AttemptOutcome, RetryState, TimeoutClass};

/// Retries requests sent through a [`Transport`].
///
/// The policy itself is immutable; every call to [`RetryPolicy::execute`]
/// builds its own [`RetryState`], so one policy can serve any number of
/// concurrent requests.
#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    settings: RetrySettings,
}

enum Step {
    Done(HttpResponse),
    Retry { delay: Duration, last: LastOutcome },
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            settings: RetrySettings::from_config(&config),
        }
    }

    pub fn from_settings(settings: RetrySettings) -> Self {
        Self { settings }
    }

    /// A policy that makes exactly one attempt.
    pub fn no_retries() -> Self {
        Self::from_settings(RetrySettings::default().with_options(&RetryOptions::no_retries()))
    }

    pub fn settings(&self) -> &RetrySettings {
        &self.settings
    }

    /// Send `request`, retrying per the policy and `options`.
    ///
    /// Retryable statuses that exhaust their budget are returned as a normal
    /// response. Errors that exhaust theirs fail with
    /// [`PipelineError::MaxRetriesExceeded`].
    pub async fn execute(
        &self,
        transport: &dyn Transport,
        request: &HttpRequest,
        options: &RetryOptions,
        cancel: &CancelHandle,
    ) -> Result<HttpResponse, PipelineError> {
        self.execute_with_state(transport, request, options, cancel)
            .await
            .0
    }

    /// Like [`RetryPolicy::execute`], also returning the final retry state.
    pub async fn execute_with_state(
        &self,
        transport: &dyn Transport,
        request: &HttpRequest,
        options: &RetryOptions,
        cancel: &CancelHandle,
    ) -> (Result<HttpResponse, PipelineError>, RetryState) {
        let settings = self.settings.with_options(options);
        let mut state = RetryState::new(&settings);
        let span = request_span(request.method.as_str(), &request.url);

        let result = run(transport, request, &settings, &mut state, cancel)
            .instrument(span.clone())
            .await;
        span.record("attempts", state.attempts());

        (result, state)
    }
}

async fn run(
    transport: &dyn Transport,
    request: &HttpRequest,
    settings: &RetrySettings,
    state: &mut RetryState,
    cancel: &CancelHandle,
) -> Result<HttpResponse, PipelineError> {
    loop {
        if cancel.is_cancelled() {
            debug!(attempts = state.attempts(), "request cancelled");
            return Err(PipelineError::Cancelled);
        }

        let start = Instant::now();
        let timeout = state.attempt_timeout(settings.connection_timeout, settings.read_timeout);
        let attempt = state.begin_attempt();
        let result = transport
            .send(request, timeout)
            .instrument(attempt_span(attempt))
            .await;

        let step = match result {
            Ok(response) => on_response(settings, request, state, response),
            Err(error) => on_error(settings, request, state, error)?,
        };

        let (delay, last) = match step {
            Step::Done(response) => return Ok(response),
            Step::Retry { delay, last } => (delay, last),
        };

        if let Some(delay) = state.clamp_delay(delay, start.elapsed()) {
            if !delay.is_zero() {
                sleep_or_cancel(transport.sleep(delay), cancel)
                    .await
                    .map_err(|_| PipelineError::Cancelled)?;
            }
        }

        if !state.consume_elapsed(start.elapsed()) {
            return Err(budget_exhausted(state, last));
        }
    }
}

fn budget_exhausted(state: &RetryState, last: LastOutcome) -> PipelineError {
    warn!(
        attempts = state.attempts(),
        "timeout budget exhausted, giving up"
    );
    let error = PipelineError::TimeoutBudgetExhausted {
        attempts: state.attempts(),
        last,
    };
    record_error(&error);
    error
}

fn on_response(
    settings: &RetrySettings,
    request: &HttpRequest,
    state: &mut RetryState,
    response: HttpResponse,
) -> Step {
    if !is_retry(settings, &request.method, &response) {
        return Step::Done(response);
    }

    if !state.increment(AttemptOutcome::Status(response.status)) {
        warn!(
            status = response.status,
            attempts = state.attempts(),
            "status retries exhausted, returning last response"
        );
        return Step::Done(response);
    }

    let delay = parse_retry_after(&response.headers).unwrap_or_else(|| state.backoff());
    let (total, connect, read, status) = state.remaining();
    debug!(
        category = "status",
        code = response.status,
        total,
        connect,
        read,
        status,
        delay_ms = delay.as_millis() as u64,
        "retrying"
    );

    state.set_timeout_class(TimeoutClass::Response);
    Step::Retry {
        delay,
        last: LastOutcome::Response(response),
    }
}

fn on_error(
    settings: &RetrySettings,
    request: &HttpRequest,
    state: &mut RetryState,
    error: TransportError,
) -> Result<Step, PipelineError> {
    let (category, next_class) = match &error {
        TransportError::Connection { .. } => ("connect", TimeoutClass::Connect),
        TransportError::Read { .. } if is_method_retryable(settings, &request.method, None) => {
            ("read", TimeoutClass::Response)
        }
        _ => {
            debug!(error = %error, method = %request.method, "not retrying");
            return Err(error.into());
        }
    };

    if !state.increment(AttemptOutcome::from(&error)) {
        warn!(
            category,
            attempts = state.attempts(),
            error = %error,
            "retries exhausted"
        );
        let error = PipelineError::MaxRetriesExceeded {
            attempts: state.attempts(),
            last: error,
        };
        record_error(&error);
        return Err(error);
    }

    let delay = state.backoff();
    let (total, connect, read, status) = state.remaining();
    debug!(
        category,
        error = %error,
        total,
        connect,
        read,
        status,
        delay_ms = delay.as_millis() as u64,
        "retrying"
    );

    state.set_timeout_class(next_class);
    Ok(Step::Retry {
        delay,
        last: LastOutcome::Error(error),
    })
}
