//! The serializable state of a long-running operation.

use conduit_common_config::FinalStateVia;
use conduit_common_http::{headers, HttpRequest, HttpResponse, Method};
use conduit_retry::parse_retry_after;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use url::Url;

use crate::error::LroError;
use crate::method::{provisioning_state, PollingMethod};
use crate::status::OperationStatus;

/// Request headers that are never replayed on polls.
const NON_REPLAYED_HEADERS: [&str; 3] = ["authorization", "content-type", "content-length"];

/// Snapshot of the most recent response, kept so a resumed poller can still
/// produce a result without polling again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseSnapshot {
    pub status: u16,
    pub body: String,
}

impl ResponseSnapshot {
    pub fn of(response: &HttpResponse) -> Self {
        Self {
            status: response.status,
            body: response.text(),
        }
    }

    pub fn to_response(&self) -> HttpResponse {
        HttpResponse::new(self.status).with_body(self.body.clone())
    }
}

/// Polling state of one operation.
///
/// This is a plain value with no reference to the poller that produced it,
/// so it can be serialized into a continuation token and restored anywhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LongRunningOperation {
    pub status: OperationStatus,
    pub polling_method: PollingMethod,
    /// URL polled next.
    pub polling_url: String,
    /// Method of the initiating request.
    pub initial_method: String,
    /// URL of the initiating request.
    pub initial_url: String,
    /// Latest `Location` header seen.
    pub location_url: Option<String>,
    /// `resourceLocation` reported by an operation status monitor.
    pub resource_location: Option<String>,
    pub final_state_via: Option<FinalStateVia>,
    /// Wait before the next poll.
    pub delay: Duration,
    /// Wait used when the service gives no hint.
    pub interval: Duration,
    /// Initiating request headers replayed on every poll.
    pub headers: Vec<(String, String)>,
    /// Most recent response: the initial one until the first poll.
    pub last_response: ResponseSnapshot,
}

impl LongRunningOperation {
    /// Build the state from the initiating request and its response.
    ///
    /// Only 200, 201, 202 and 204 can start an operation.
    pub fn from_initial(
        request: &HttpRequest,
        response: &HttpResponse,
        interval: Duration,
        final_state_via: Option<FinalStateVia>,
    ) -> Result<Self, LroError> {
        if !matches!(response.status, 200 | 201 | 202 | 204) {
            return Err(LroError::unexpected(response.clone()));
        }

        let polling_method = PollingMethod::select(&request.method, response);
        let location_url = response
            .header_str(headers::LOCATION)
            .map(|l| resolve_url(&request.url, l));

        let polling_url = match polling_method.tracking_header() {
            Some(header) => response
                .header_str(header)
                .map(|u| resolve_url(&request.url, u))
                .ok_or_else(|| LroError::BadResponse(format!("missing {} header", header)))?,
            None => request.url.clone(),
        };

        let status = match polling_method {
            PollingMethod::Done => provisioning_state(&response.json_value().ok().flatten())
                .filter(OperationStatus::is_terminal)
                .unwrap_or(OperationStatus::Succeeded),
            _ => OperationStatus::InProgress,
        };

        let headers = request
            .headers
            .iter()
            .filter(|(name, _)| !NON_REPLAYED_HEADERS.contains(&name.as_str()))
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        Ok(Self {
            status,
            polling_method,
            polling_url,
            initial_method: request.method.as_str().to_string(),
            initial_url: request.url.clone(),
            location_url,
            resource_location: None,
            final_state_via,
            delay: parse_retry_after(&response.headers).unwrap_or(interval),
            interval,
            headers,
            last_response: ResponseSnapshot::of(response),
        })
    }

    /// Fold a poll response into the state and return the new status.
    ///
    /// Terminal states are absorbing: once reached, further responses are
    /// ignored.
    pub fn update(&mut self, response: &HttpResponse) -> Result<OperationStatus, LroError> {
        if self.status.is_terminal() {
            return Ok(self.status);
        }

        let status = self.polling_method.status_of(response)?;
        let base = self.polling_url.clone();

        if let Some(url) = self
            .polling_method
            .tracking_header()
            .and_then(|h| response.header_str(h))
        {
            self.polling_url = resolve_url(&base, url);
        }

        if let Some(location) = response.header_str(headers::LOCATION) {
            self.location_url = Some(resolve_url(&base, location));
        }

        if let PollingMethod::OperationResource { .. } = self.polling_method {
            if let Some(resource) = response
                .json_value()
                .ok()
                .flatten()
                .and_then(|b| b.get("resourceLocation").and_then(Value::as_str).map(str::to_string))
            {
                self.resource_location = Some(resolve_url(&base, &resource));
            }
        }

        self.delay = parse_retry_after(&response.headers).unwrap_or(self.interval);
        self.last_response = ResponseSnapshot::of(response);
        self.status = status;
        Ok(status)
    }

    /// URL to GET for the final result once the operation succeeded.
    ///
    /// `None` means the last poll response is the result.
    pub fn final_get_url(&self) -> Option<&str> {
        let method = self.method();
        let is_put_or_patch = method == Method::PUT || method == Method::PATCH;

        match &self.polling_method {
            // the last poll already fetched the resource itself
            PollingMethod::Done | PollingMethod::Body => None,
            PollingMethod::Location => {
                if is_put_or_patch {
                    Some(self.initial_url.as_str())
                } else {
                    None
                }
            }
            PollingMethod::OperationResource { .. } => {
                match self.final_state_via {
                    Some(FinalStateVia::AzureAsyncOperation | FinalStateVia::OperationLocation)
                        if method == Method::POST =>
                    {
                        return None
                    }
                    Some(FinalStateVia::Location) => {
                        if let Some(location) = self.location_url.as_deref() {
                            return Some(location);
                        }
                    }
                    Some(FinalStateVia::OriginalUri) => return Some(self.initial_url.as_str()),
                    _ => {}
                }

                if is_put_or_patch {
                    return Some(self.initial_url.as_str());
                }
                if method == Method::POST {
                    if let Some(location) = self.location_url.as_deref() {
                        return Some(location);
                    }
                }
                self.resource_location.as_deref()
            }
        }
    }

    /// The GET that polls the operation.
    pub fn poll_request(&self) -> HttpRequest {
        self.get(&self.polling_url)
    }

    /// A GET to `url` carrying the replayed headers.
    pub fn get(&self, url: &str) -> HttpRequest {
        self.headers
            .iter()
            .fold(HttpRequest::get(url), |request, (name, value)| {
                request.header(name, value)
            })
    }

    /// Method of the initiating request.
    pub fn method(&self) -> Method {
        Method::from_bytes(self.initial_method.as_bytes()).unwrap_or(Method::GET)
    }
}

/// Resolve a header URL against the URL of the request it answered.
fn resolve_url(base: &str, value: &str) -> String {
    Url::parse(base)
        .and_then(|base| base.join(value))
        .map(String::from)
        .unwrap_or_else(|_| value.to_string())
}
