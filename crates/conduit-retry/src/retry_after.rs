//! Server-provided retry hints.

use chrono::{DateTime, Utc};
use conduit_common_http::{headers, HeaderMap};
use std::time::Duration;

/// Read the delay a server asked for, if any.
///
/// `retry-after-ms` and `x-ms-retry-after-ms` (milliseconds) win over
/// `Retry-After`, which may hold seconds or an HTTP-date. Values that do not
/// parse, or are negative, are ignored.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    for name in [headers::RETRY_AFTER_MS, headers::X_MS_RETRY_AFTER_MS] {
        if let Some(ms) = header(headers, name).and_then(parse_non_negative) {
            return Some(Duration::from_secs_f64(ms / 1000.0));
        }
    }

    header(headers, headers::RETRY_AFTER).and_then(parse_retry_after_value)
}

/// Parse a `Retry-After` value: delta-seconds or an HTTP-date.
///
/// Dates in the past yield a zero delay.
pub fn parse_retry_after_value(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Some(secs) = parse_non_negative(value) {
        return Some(Duration::from_secs_f64(secs));
    }

    let date = DateTime::parse_from_rfc2822(value).ok()?;
    let delta = date.with_timezone(&Utc) - Utc::now();
    Some(delta.to_std().unwrap_or(Duration::ZERO))
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn parse_non_negative(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0 && *v < u64::MAX as f64)
}
