//! Span helpers for requests, attempts and polls.

use tracing::{debug_span, info_span, Span};

/// Span covering one logical request, across all of its attempts.
pub fn request_span(method: &str, url: &str) -> Span {
    info_span!(
        "request",
        method = %method,
        url = %url,
        attempts = tracing::field::Empty,
        error = tracing::field::Empty,
    )
}

/// Span covering a single attempt of a logical request.
pub fn attempt_span(attempt: u32) -> Span {
    debug_span!("attempt", n = attempt)
}

/// Span covering one poll of a long-running operation.
pub fn poll_span(url: &str, poll: u32) -> Span {
    debug_span!("poll", url = %url, n = poll, error = tracing::field::Empty)
}

/// Span covering a long-running operation from start to terminal state.
pub fn operation_span(url: &str) -> Span {
    info_span!(
        "operation",
        url = %url,
        status = tracing::field::Empty,
        error = tracing::field::Empty,
    )
}

/// Record an error on the current span's `error` field.
pub fn record_error(error: &dyn std::error::Error) {
    Span::current().record("error", tracing::field::display(error));
}

/// Re-export of tracing's instrumentation extension.
pub use tracing::Instrument;
