//! Poller errors.

use conduit_common_http::{HttpResponse, ResponseError};
use conduit_retry::PipelineError;

use crate::status::OperationStatus;

/// Errors surfaced while driving a long-running operation.
#[derive(Debug, thiserror::Error)]
pub enum LroError {
    /// A request failed in the pipeline, after its own retries.
    #[error(transparent)]
    Pipeline(PipelineError),

    /// The operation reached `Failed` or `Canceled`.
    #[error("operation ended with status {status}")]
    OperationFailed {
        status: OperationStatus,
        response: Box<HttpResponse>,
    },

    /// A non-success status from the initial, poll or final request.
    #[error("unexpected response status {status}")]
    UnexpectedStatus {
        status: u16,
        response: Box<HttpResponse>,
    },

    #[error("bad polling response: {0}")]
    BadResponse(String),

    #[error("failed to deserialize final result: {0}")]
    Deserialize(#[from] ResponseError),

    #[error("invalid continuation token: {0}")]
    InvalidContinuationToken(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl From<PipelineError> for LroError {
    fn from(error: PipelineError) -> Self {
        match error {
            PipelineError::Cancelled => Self::Cancelled,
            other => Self::Pipeline(other),
        }
    }
}

impl LroError {
    pub(crate) fn unexpected(response: HttpResponse) -> Self {
        Self::UnexpectedStatus {
            status: response.status,
            response: Box::new(response),
        }
    }

    /// The response attached to the error, if any.
    pub fn response(&self) -> Option<&HttpResponse> {
        match self {
            Self::OperationFailed { response, .. } | Self::UnexpectedStatus { response, .. } => {
                Some(response)
            }
            _ => None,
        }
    }
}
