//! Driving an operation to completion.

use async_trait::async_trait;
use conduit_common_async::{sleep_or_cancel, CancelHandle};
use conduit_common_config::{FinalStateVia, PollingConfig};
use conduit_common_http::{HttpRequest, HttpResponse};
use conduit_common_log::spans::{operation_span, poll_span, record_error, Instrument};
use conduit_retry::{Pipeline, RetryOptions};
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn, Span};

use crate::error::LroError;
use crate::method::PollingMethod;
use crate::operation::LongRunningOperation;
use crate::status::OperationStatus;
use crate::token::ContinuationToken;

/// Delay between polls when neither the service nor the caller picks one.
pub const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_secs(30);

/// Service-side cancellation, for services that support it.
#[async_trait]
pub trait OperationCanceller: Send + Sync {
    async fn cancel(&self, operation: &LongRunningOperation) -> Result<(), LroError>;
}

/// Options for starting or resuming a poller.
#[derive(Debug, Clone, Default)]
pub struct PollerOptions {
    /// Delay between polls without a `Retry-After` hint. When resuming,
    /// `None` keeps the interval stored in the token.
    pub interval: Option<Duration>,
    /// Override where the final result is read from.
    pub final_state_via: Option<FinalStateVia>,
    /// Retry options applied to every poll and to the final GET.
    pub retry: RetryOptions,
}

impl PollerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &PollingConfig) -> Self {
        Self {
            interval: Some(Duration::try_from_secs_f64(config.interval).unwrap_or(Duration::ZERO)),
            final_state_via: config.final_state_via,
            retry: RetryOptions::default(),
        }
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn final_state_via(mut self, via: FinalStateVia) -> Self {
        self.final_state_via = Some(via);
        self
    }

    pub fn retry(mut self, retry: RetryOptions) -> Self {
        self.retry = retry;
        self
    }
}

/// Handle to a long-running operation.
///
/// Polls go through the same retry-wrapped [`Pipeline`] as every other
/// request, so transient poll failures are retried there; a terminal failed
/// status is reported once and never retried.
pub struct LroPoller {
    pipeline: Pipeline,
    operation: LongRunningOperation,
    retry: RetryOptions,
    last_response: HttpResponse,
    final_response: Option<HttpResponse>,
    polls: u32,
    abandoned: bool,
    cancel: CancelHandle,
    canceller: Option<Arc<dyn OperationCanceller>>,
}

impl fmt::Debug for LroPoller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LroPoller")
            .field("operation", &self.operation)
            .field("polls", &self.polls)
            .field("abandoned", &self.abandoned)
            .finish_non_exhaustive()
    }
}

impl LroPoller {
    /// Send the initiating request and start polling its response.
    pub async fn begin(
        pipeline: Pipeline,
        request: HttpRequest,
        options: PollerOptions,
    ) -> Result<Self, LroError> {
        let response = pipeline.send(&request, &options.retry).await?;
        Self::start(pipeline, &request, response, options)
    }

    /// Start tracking an operation from its initial response.
    ///
    /// A response that already completed the operation leaves the poller
    /// done, with the initial response as the result.
    pub fn start(
        pipeline: Pipeline,
        initial_request: &HttpRequest,
        initial_response: HttpResponse,
        options: PollerOptions,
    ) -> Result<Self, LroError> {
        let interval = options.interval.unwrap_or(DEFAULT_POLLING_INTERVAL);
        let operation = LongRunningOperation::from_initial(
            initial_request,
            &initial_response,
            interval,
            options.final_state_via,
        )?;

        debug!(
            method = ?operation.polling_method,
            url = %operation.polling_url,
            status = %operation.status,
            "operation started"
        );

        Ok(Self::assemble(pipeline, operation, initial_response, options.retry))
    }

    /// Rebuild a poller from a continuation token without re-issuing the
    /// initiating request.
    pub fn from_continuation_token(
        token: &ContinuationToken,
        pipeline: Pipeline,
        options: PollerOptions,
    ) -> Result<Self, LroError> {
        let mut operation = token.decode()?;
        if let Some(interval) = options.interval {
            operation.interval = interval;
        }
        if options.final_state_via.is_some() {
            operation.final_state_via = options.final_state_via;
        }

        debug!(url = %operation.polling_url, status = %operation.status, "operation resumed");
        let last_response = operation.last_response.to_response();
        Ok(Self::assemble(pipeline, operation, last_response, options.retry))
    }

    fn assemble(
        pipeline: Pipeline,
        operation: LongRunningOperation,
        last_response: HttpResponse,
        retry: RetryOptions,
    ) -> Self {
        let final_response = (operation.polling_method == PollingMethod::Done
            && operation.status == OperationStatus::Succeeded)
            .then(|| last_response.clone());

        Self {
            pipeline,
            operation,
            retry,
            last_response,
            final_response,
            polls: 0,
            abandoned: false,
            cancel: CancelHandle::new(),
            canceller: None,
        }
    }

    /// Use `canceller` to cancel the operation on the service as well.
    pub fn with_canceller(mut self, canceller: Arc<dyn OperationCanceller>) -> Self {
        self.canceller = Some(canceller);
        self
    }

    /// Interrupt waits and polls when `cancel` fires.
    pub fn with_cancel_handle(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    /// Poll once and return the updated status.
    ///
    /// Does not wait first; terminal operations are not polled again.
    pub async fn poll(&mut self) -> Result<OperationStatus, LroError> {
        if self.abandoned {
            return Err(LroError::Cancelled);
        }
        if self.operation.status.is_terminal() {
            return Ok(self.operation.status);
        }

        self.polls += 1;
        let request = self.operation.poll_request();
        let response = self
            .pipeline
            .send_with_cancel(&request, &self.retry, &self.cancel)
            .instrument(poll_span(&request.url, self.polls))
            .await?;

        let previous = self.operation.status;
        let status = self.operation.update(&response)?;
        if status != previous {
            debug!(from = %previous, to = %status, url = %request.url, "operation status changed");
        }

        self.last_response = response;
        Ok(status)
    }

    /// Poll at the operation's delay until it is terminal, then resolve the
    /// final result.
    pub async fn wait(&mut self) -> Result<(), LroError> {
        let span = operation_span(&self.operation.initial_url);
        self.wait_inner().instrument(span).await
    }

    async fn wait_inner(&mut self) -> Result<(), LroError> {
        while !self.operation.status.is_terminal() {
            if self.abandoned || self.cancel.is_cancelled() {
                return Err(LroError::Cancelled);
            }

            let delay = self.operation.delay;
            if !delay.is_zero() {
                sleep_or_cancel(self.pipeline.sleep(delay), &self.cancel)
                    .await
                    .map_err(|_| LroError::Cancelled)?;
            }

            self.poll().await?;
        }

        let status = self.operation.status;
        Span::current().record("status", status.as_str());

        if status.is_failure() {
            warn!(%status, polls = self.polls, "operation did not succeed");
            let error = LroError::OperationFailed {
                status,
                response: Box::new(self.last_response.clone()),
            };
            record_error(&error);
            return Err(error);
        }

        if self.final_response.is_none() {
            self.final_response = Some(self.fetch_final().await?);
        }
        Ok(())
    }

    async fn fetch_final(&self) -> Result<HttpResponse, LroError> {
        let Some(url) = self.operation.final_get_url() else {
            return Ok(self.last_response.clone());
        };

        debug!(url, "fetching final resource");
        let request = self.operation.get(url);
        let response = self
            .pipeline
            .send_with_cancel(&request, &self.retry, &self.cancel)
            .await?;

        if !response.is_success() {
            return Err(LroError::unexpected(response));
        }
        Ok(response)
    }

    /// Wait for completion and return the response holding the result.
    pub async fn result_response(&mut self) -> Result<HttpResponse, LroError> {
        self.wait().await?;
        self.final_response
            .clone()
            .ok_or_else(|| LroError::BadResponse("operation finished without a result".to_string()))
    }

    /// Wait for completion and deserialize the result. An empty final body
    /// yields `None`.
    pub async fn result<T: DeserializeOwned>(&mut self) -> Result<Option<T>, LroError> {
        let response = self.result_response().await?;
        if response.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        Ok(Some(response.json()?))
    }

    /// Abandon the operation locally, and on the service when a canceller is
    /// attached.
    pub async fn cancel(&mut self) -> Result<(), LroError> {
        self.abandoned = true;
        debug!(url = %self.operation.polling_url, "operation abandoned");

        if let Some(canceller) = &self.canceller {
            canceller.cancel(&self.operation).await?;
        }
        Ok(())
    }

    /// Serializable snapshot for resuming elsewhere.
    pub fn continuation_token(&self) -> Result<ContinuationToken, LroError> {
        ContinuationToken::encode(&self.operation)
    }

    pub fn status(&self) -> OperationStatus {
        self.operation.status
    }

    pub fn is_done(&self) -> bool {
        self.operation.status.is_terminal()
    }

    pub fn is_abandoned(&self) -> bool {
        self.abandoned
    }

    /// Polls issued by this handle.
    pub fn polls(&self) -> u32 {
        self.polls
    }

    pub fn operation(&self) -> &LongRunningOperation {
        &self.operation
    }

    pub fn last_response(&self) -> &HttpResponse {
        &self.last_response
    }

    /// A handle that interrupts this poller's waits when cancelled.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }
}
