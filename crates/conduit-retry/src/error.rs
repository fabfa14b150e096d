//! Pipeline errors.

use conduit_common_http::{FailureClass, HttpResponse, TransportError};
use std::fmt;

/// The last thing observed before the pipeline gave up.
#[derive(Debug)]
pub enum LastOutcome {
    Response(HttpResponse),
    Error(TransportError),
}

impl LastOutcome {
    /// Failure class of the outcome.
    pub fn class(&self) -> FailureClass {
        match self {
            Self::Response(_) => FailureClass::RetryableStatus,
            Self::Error(error) => error.class(),
        }
    }

    /// The last response, if the last attempt produced one.
    pub fn response(&self) -> Option<&HttpResponse> {
        match self {
            Self::Response(response) => Some(response),
            Self::Error(_) => None,
        }
    }
}

impl fmt::Display for LastOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Response(response) => write!(f, "last response status {}", response.status),
            Self::Error(error) => write!(f, "last error: {}", error),
        }
    }
}

/// Errors surfaced by the request pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Credentials were refused. Never retried.
    #[error(transparent)]
    Authentication(TransportError),

    /// A pre-send failure that was not retried.
    #[error(transparent)]
    Connection(TransportError),

    /// A post-send failure that was not retried.
    #[error(transparent)]
    Transport(TransportError),

    /// The request could not be built.
    #[error(transparent)]
    InvalidRequest(TransportError),

    #[error("retries exhausted after {attempts} attempts: {last}")]
    MaxRetriesExceeded {
        attempts: u32,
        #[source]
        last: TransportError,
    },

    #[error("timeout budget exhausted after {attempts} attempts ({last})")]
    TimeoutBudgetExhausted { attempts: u32, last: LastOutcome },

    #[error("request cancelled")]
    Cancelled,
}

impl From<TransportError> for PipelineError {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::Connection { .. } => Self::Connection(error),
            TransportError::Read { .. } => Self::Transport(error),
            TransportError::Authentication { .. } => Self::Authentication(error),
            TransportError::InvalidRequest { .. } => Self::InvalidRequest(error),
        }
    }
}

impl PipelineError {
    /// Failure class of the underlying cause. `None` for cancellation.
    pub fn class(&self) -> Option<FailureClass> {
        match self {
            Self::Authentication(_) => Some(FailureClass::Authentication),
            Self::Connection(_) => Some(FailureClass::Connection),
            Self::Transport(_) => Some(FailureClass::Transport),
            Self::InvalidRequest(_) => Some(FailureClass::InvalidRequest),
            Self::MaxRetriesExceeded { last, .. } => Some(last.class()),
            Self::TimeoutBudgetExhausted { last, .. } => Some(last.class()),
            Self::Cancelled => None,
        }
    }

    /// Whether the failure is transient, so issuing the request again later
    /// may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.class(),
            Some(FailureClass::Connection | FailureClass::Transport | FailureClass::RetryableStatus)
        )
    }

    /// Number of attempts made, when the pipeline gave up on a budget.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            Self::MaxRetriesExceeded { attempts, .. }
            | Self::TimeoutBudgetExhausted { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        assert!(matches!(
            PipelineError::from(TransportError::connection("refused")),
            PipelineError::Connection(_)
        ));
        assert!(matches!(
            PipelineError::from(TransportError::read("reset")),
            PipelineError::Transport(_)
        ));
        assert!(matches!(
            PipelineError::from(TransportError::authentication("expired")),
            PipelineError::Authentication(_)
        ));
        assert!(matches!(
            PipelineError::from(TransportError::invalid_request("bad url")),
            PipelineError::InvalidRequest(_)
        ));
    }

    #[test]
    fn test_retryability() {
        assert!(!PipelineError::from(TransportError::authentication("no")).is_retryable());
        assert!(!PipelineError::from(TransportError::invalid_request("no")).is_retryable());
        assert!(!PipelineError::Cancelled.is_retryable());
        assert!(PipelineError::from(TransportError::read("reset")).is_retryable());

        let exhausted = PipelineError::MaxRetriesExceeded {
            attempts: 4,
            last: TransportError::connection("refused"),
        };
        assert!(exhausted.is_retryable());
        assert_eq!(exhausted.class(), Some(FailureClass::Connection));
        assert_eq!(exhausted.attempts(), Some(4));

        let budget = PipelineError::TimeoutBudgetExhausted {
            attempts: 2,
            last: LastOutcome::Response(HttpResponse::new(503)),
        };
        assert_eq!(budget.class(), Some(FailureClass::RetryableStatus));
        assert!(budget.is_retryable());
    }

    #[test]
    fn test_display() {
        let err = PipelineError::MaxRetriesExceeded {
            attempts: 4,
            last: TransportError::connection("refused"),
        };
        assert_eq!(
            err.to_string(),
            "retries exhausted after 4 attempts: connection failed: refused"
        );

        let err = PipelineError::TimeoutBudgetExhausted {
            attempts: 2,
            last: LastOutcome::Response(HttpResponse::new(503)),
        };
        assert_eq!(
            err.to_string(),
            "timeout budget exhausted after 2 attempts (last response status 503)"
        );

        let err = PipelineError::from(TransportError::authentication("expired token"));
        assert_eq!(err.to_string(), "authentication failed: expired token");
    }
}
