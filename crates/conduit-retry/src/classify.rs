//! Deciding which outcomes are worth another attempt.

use conduit_common_http::{HttpResponse, Method};

use crate::retry_after::parse_retry_after;
use crate::settings::RetrySettings;

/// Status codes retried by default.
pub const DEFAULT_RETRY_STATUS_CODES: [u16; 5] = [429, 500, 502, 503, 504];

/// Methods retried after the request was sent, by default.
pub const DEFAULT_RETRY_METHODS: [Method; 6] = [
    Method::HEAD,
    Method::GET,
    Method::PUT,
    Method::DELETE,
    Method::OPTIONS,
    Method::TRACE,
];

/// Statuses that are always retried when the server sent a retry hint.
const RETRY_AFTER_STATUS_CODES: [u16; 3] = [413, 429, 503];

/// Whether a request with `method` may be repeated.
///
/// `status` is the response that triggered the decision, if any. POST and
/// PATCH are repeated on 500, 503 and 504 responses even though they are not
/// in the default method set, since those statuses mean the request was not
/// processed. A per-call `idempotent` override beats everything else.
pub fn is_method_retryable(settings: &RetrySettings, method: &Method, status: Option<u16>) -> bool {
    if let Some(idempotent) = settings.idempotent {
        return idempotent;
    }

    if settings.retry_on_methods.contains(method) {
        return true;
    }

    (*method == Method::POST || *method == Method::PATCH)
        && matches!(status, Some(500 | 503 | 504))
}

/// Whether `response` should be retried.
pub fn is_retry(settings: &RetrySettings, method: &Method, response: &HttpResponse) -> bool {
    if RETRY_AFTER_STATUS_CODES.contains(&response.status)
        && parse_retry_after(&response.headers).is_some()
    {
        return true;
    }

    settings.retry_on_status_codes.contains(&response.status)
        && is_method_retryable(settings, method, Some(response.status))
}
