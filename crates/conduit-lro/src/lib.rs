//! Long-running operation poller for the conduit request pipeline.
//!
//! An operation that answers immediately with a tracking handle is picked up
//! by [`LroPoller::start`], which works out how to track it
//! ([`PollingMethod`]) and where its final result will live. Polls and the
//! final GET go through the retry-wrapped [`Pipeline`](conduit_retry::Pipeline).
//!
//! ```no_run
//! # async fn run(pipeline: conduit_retry::Pipeline) -> Result<(), conduit_lro::LroError> {
//! use conduit_common_http::{HttpRequest, Method};
//! use conduit_lro::{LroPoller, PollerOptions};
//!
//! let request = HttpRequest::new(Method::PUT, "https://example.com/widgets/1");
//! let mut poller = LroPoller::begin(pipeline, request, PollerOptions::new()).await?;
//! let token = poller.continuation_token()?;
//! let widget: Option<serde_json::Value> = poller.result().await?;
//! # let _ = (token, widget);
//! # Ok(())
//! # }
//! ```

pub mod blocking;
pub mod error;
pub mod method;
pub mod operation;
pub mod poller;
pub mod status;
pub mod token;

pub use blocking::BlockingPoller;
pub use error::LroError;
pub use method::PollingMethod;
pub use operation::{LongRunningOperation, ResponseSnapshot};
pub use poller::{LroPoller, OperationCanceller, PollerOptions, DEFAULT_POLLING_INTERVAL};
pub use status::OperationStatus;
pub use token::ContinuationToken;

pub use conduit_common_config::FinalStateVia;
