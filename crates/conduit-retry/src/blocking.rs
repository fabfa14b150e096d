//! Thread-blocking flavor of the pipeline.

use conduit_common_async::{build_runtime, CancelHandle, RuntimeConfig};
use conduit_common_http::{HttpRequest, HttpResponse};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

use crate::error::PipelineError;
use crate::pipeline::Pipeline;
use crate::settings::RetryOptions;

/// Drives the async pipeline on a private runtime, blocking the caller.
///
/// Must not be used from inside another Tokio runtime.
#[derive(Debug, Clone)]
pub struct BlockingPipeline {
    runtime: Arc<Runtime>,
    pipeline: Pipeline,
}

impl BlockingPipeline {
    pub fn new(pipeline: Pipeline) -> std::io::Result<Self> {
        Self::with_runtime_config(pipeline, RuntimeConfig::default())
    }

    pub fn with_runtime_config(pipeline: Pipeline, config: RuntimeConfig) -> std::io::Result<Self> {
        Ok(Self {
            runtime: Arc::new(build_runtime(config)?),
            pipeline,
        })
    }

    pub fn send(
        &self,
        request: &HttpRequest,
        options: &RetryOptions,
    ) -> Result<HttpResponse, PipelineError> {
        self.block_on(self.pipeline.send(request, options))
    }

    pub fn send_with_cancel(
        &self,
        request: &HttpRequest,
        options: &RetryOptions,
        cancel: &CancelHandle,
    ) -> Result<HttpResponse, PipelineError> {
        self.block_on(self.pipeline.send_with_cancel(request, options, cancel))
    }

    /// Block the calling thread through the transport's sleep primitive.
    pub fn sleep(&self, duration: Duration) {
        self.block_on(self.pipeline.sleep(duration))
    }

    /// Run any future on this pipeline's runtime.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }
}
