//! Thread-blocking flavor of the poller.

use conduit_common_http::{HttpRequest, HttpResponse};
use conduit_retry::BlockingPipeline;
use serde::de::DeserializeOwned;

use crate::error::LroError;
use crate::poller::{LroPoller, PollerOptions};
use crate::status::OperationStatus;
use crate::token::ContinuationToken;

/// Blocks the calling thread while polling, on the runtime of a
/// [`BlockingPipeline`].
#[derive(Debug)]
pub struct BlockingPoller {
    inner: LroPoller,
    pipeline: BlockingPipeline,
}

impl BlockingPoller {
    pub fn begin(
        pipeline: &BlockingPipeline,
        request: HttpRequest,
        options: PollerOptions,
    ) -> Result<Self, LroError> {
        let inner = pipeline.block_on(LroPoller::begin(
            pipeline.pipeline().clone(),
            request,
            options,
        ))?;
        Ok(Self::wrap(pipeline, inner))
    }

    pub fn start(
        pipeline: &BlockingPipeline,
        initial_request: &HttpRequest,
        initial_response: HttpResponse,
        options: PollerOptions,
    ) -> Result<Self, LroError> {
        let inner = LroPoller::start(
            pipeline.pipeline().clone(),
            initial_request,
            initial_response,
            options,
        )?;
        Ok(Self::wrap(pipeline, inner))
    }

    pub fn from_continuation_token(
        token: &ContinuationToken,
        pipeline: &BlockingPipeline,
        options: PollerOptions,
    ) -> Result<Self, LroError> {
        let inner =
            LroPoller::from_continuation_token(token, pipeline.pipeline().clone(), options)?;
        Ok(Self::wrap(pipeline, inner))
    }

    fn wrap(pipeline: &BlockingPipeline, inner: LroPoller) -> Self {
        Self {
            inner,
            pipeline: pipeline.clone(),
        }
    }

    pub fn poll(&mut self) -> Result<OperationStatus, LroError> {
        self.pipeline.block_on(self.inner.poll())
    }

    pub fn wait(&mut self) -> Result<(), LroError> {
        self.pipeline.block_on(self.inner.wait())
    }

    pub fn result_response(&mut self) -> Result<HttpResponse, LroError> {
        self.pipeline.block_on(self.inner.result_response())
    }

    pub fn result<T: DeserializeOwned>(&mut self) -> Result<Option<T>, LroError> {
        self.pipeline.block_on(self.inner.result())
    }

    pub fn cancel(&mut self) -> Result<(), LroError> {
        self.pipeline.block_on(self.inner.cancel())
    }

    pub fn continuation_token(&self) -> Result<ContinuationToken, LroError> {
        self.inner.continuation_token()
    }

    pub fn status(&self) -> OperationStatus {
        self.inner.status()
    }

    pub fn is_done(&self) -> bool {
        self.inner.is_done()
    }

    /// The underlying async poller.
    pub fn into_inner(self) -> LroPoller {
        self.inner
    }
}
