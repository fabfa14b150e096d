//! A transport paired with a retry policy.

use conduit_common_async::CancelHandle;
use conduit_common_config::ConduitConfig;
use conduit_common_http::{
    HttpConfig, HttpRequest, HttpResponse, ReqwestTransport, Transport, TransportError,
};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::PipelineError;
use crate::policy::RetryPolicy;
use crate::settings::RetryOptions;

/// The request pipeline: every request goes through the retry policy before
/// reaching the shared transport.
///
/// Cloning is cheap and clones share the transport.
#[derive(Clone)]
pub struct Pipeline {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    pub fn new(transport: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    /// Build a `reqwest`-backed pipeline from configuration.
    pub fn from_config(config: &ConduitConfig) -> Result<Self, TransportError> {
        let transport = ReqwestTransport::with_config(&HttpConfig::from(&config.transport))?;
        Ok(Self::new(
            Arc::new(transport),
            RetryPolicy::new(config.retry.clone()),
        ))
    }

    /// Send a request through the retry policy.
    pub async fn send(
        &self,
        request: &HttpRequest,
        options: &RetryOptions,
    ) -> Result<HttpResponse, PipelineError> {
        self.send_with_cancel(request, options, &CancelHandle::new())
            .await
    }

    /// Send a request, giving up between attempts once `cancel` fires.
    pub async fn send_with_cancel(
        &self,
        request: &HttpRequest,
        options: &RetryOptions,
        cancel: &CancelHandle,
    ) -> Result<HttpResponse, PipelineError> {
        self.policy
            .execute(self.transport.as_ref(), request, options, cancel)
            .await
    }

    /// Suspend through the transport's sleep primitive.
    pub async fn sleep(&self, duration: Duration) {
        self.transport.sleep(duration).await
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}
