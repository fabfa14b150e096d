//! Retry, backoff and timeout-budget policy for the conduit request pipeline.
//!
//! A [`RetryPolicy`] wraps a [`Transport`](conduit_common_http::Transport) and
//! re-issues a request until it gets a usable response, runs out of retry
//! budget, or runs out of time. [`Pipeline`] pairs a shared transport with a
//! policy and is what callers normally hold.

pub mod backoff;
pub mod blocking;
pub mod classify;
pub mod error;
pub mod pipeline;
pub mod policy;
pub mod retry_after;
pub mod settings;
pub mod state;

pub use backoff::compute_backoff;
pub use blocking::BlockingPipeline;
pub use classify::{is_method_retryable, is_retry, DEFAULT_RETRY_METHODS, DEFAULT_RETRY_STATUS_CODES};
pub use error::{LastOutcome, PipelineError};
pub use pipeline::Pipeline;
pub use policy::RetryPolicy;
pub use retry_after::{parse_retry_after, parse_retry_after_value};
pub use settings::{RetryOptions, RetrySettings};
pub use state::{AttemptOutcome, RetryAttempt, RetryState, TimeoutClass};

pub use conduit_common_async::CancelHandle;
pub use conduit_common_config::RetryMode;
