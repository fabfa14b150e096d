//! How an operation is tracked, picked from the initial response.

use conduit_common_http::{headers, HttpResponse, Method};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::LroError;
use crate::status::OperationStatus;

/// Where progress of an operation is read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PollingMethod {
    /// Poll a status monitor named by `header`
    /// (`Azure-AsyncOperation` or `Operation-Location`).
    OperationResource { header: String },
    /// Poll the `Location` header; 202 means still running.
    Location,
    /// Poll the resource itself and read its `provisioningState`.
    Body,
    /// Completed synchronously; nothing to poll.
    Done,
}

impl PollingMethod {
    /// Pick the polling method for an initial response.
    pub fn select(method: &Method, response: &HttpResponse) -> Self {
        for header in [headers::AZURE_ASYNC_OPERATION, headers::OPERATION_LOCATION] {
            if response.header_str(header).is_some() {
                return Self::OperationResource {
                    header: header.to_string(),
                };
            }
        }

        if response.header_str(headers::LOCATION).is_some() {
            return Self::Location;
        }

        let is_put_or_patch = *method == Method::PUT || *method == Method::PATCH;
        if is_put_or_patch && matches!(response.status, 200 | 201) {
            let state = provisioning_state(&json_body(response));
            let pending = match state {
                Some(state) => !state.is_terminal(),
                None => response.status == 201,
            };
            if pending {
                return Self::Body;
            }
        }

        Self::Done
    }

    /// Header that carries the next polling URL, if any.
    pub fn tracking_header(&self) -> Option<&str> {
        match self {
            Self::OperationResource { header } => Some(header.as_str()),
            Self::Location => Some(headers::LOCATION),
            Self::Body | Self::Done => None,
        }
    }

    /// Status reported by a poll response.
    ///
    /// An explicit status in the body wins; otherwise 202 means the operation
    /// is still running and any other 2xx means it finished.
    pub fn status_of(&self, response: &HttpResponse) -> Result<OperationStatus, LroError> {
        if !response.is_success() {
            return Err(LroError::unexpected(response.clone()));
        }

        let explicit = match self {
            Self::OperationResource { .. } => {
                let body = response
                    .json_value()
                    .map_err(|e| LroError::BadResponse(e.to_string()))?;
                body.as_ref()
                    .and_then(|b| b.get("status"))
                    .and_then(Value::as_str)
                    .map(OperationStatus::parse)
            }
            Self::Body => provisioning_state(&json_body(response)),
            Self::Location | Self::Done => None,
        };

        Ok(explicit.unwrap_or(if response.status == 202 {
            OperationStatus::InProgress
        } else {
            OperationStatus::Succeeded
        }))
    }
}

fn json_body(response: &HttpResponse) -> Option<Value> {
    response.json_value().ok().flatten()
}

/// ARM `provisioningState`, at the top level or under `properties`.
pub(crate) fn provisioning_state(body: &Option<Value>) -> Option<OperationStatus> {
    let body = body.as_ref()?;
    body.get("properties")
        .and_then(|p| p.get("provisioningState"))
        .or_else(|| body.get("provisioningState"))
        .and_then(Value::as_str)
        .map(OperationStatus::parse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn with_json(status: u16, body: Value) -> HttpResponse {
        HttpResponse::new(status).with_json(&body)
    }

    #[test]
    fn test_select_operation_resource() {
        let response = HttpResponse::new(202)
            .with_header("Azure-AsyncOperation", "https://x/op1")
            .with_header("Location", "https://x/loc");
        assert_eq!(
            PollingMethod::select(&Method::PUT, &response),
            PollingMethod::OperationResource {
                header: "azure-asyncoperation".to_string()
            }
        );

        let response = HttpResponse::new(202).with_header("Operation-Location", "https://x/op2");
        assert_eq!(
            PollingMethod::select(&Method::POST, &response),
            PollingMethod::OperationResource {
                header: "operation-location".to_string()
            }
        );
    }

    #[test]
    fn test_select_location() {
        let response = HttpResponse::new(202).with_header("Location", "https://x/loc");
        assert_eq!(
            PollingMethod::select(&Method::DELETE, &response),
            PollingMethod::Location
        );
    }

    #[test]
    fn test_select_body() {
        let creating = with_json(201, json!({"properties": {"provisioningState": "Creating"}}));
        assert_eq!(
            PollingMethod::select(&Method::PUT, &creating),
            PollingMethod::Body
        );

        let bare_created = HttpResponse::new(201);
        assert_eq!(
            PollingMethod::select(&Method::PATCH, &bare_created),
            PollingMethod::Body
        );

        let done = with_json(200, json!({"properties": {"provisioningState": "Succeeded"}}));
        assert_eq!(PollingMethod::select(&Method::PUT, &done), PollingMethod::Done);
    }

    #[test]
    fn test_select_done() {
        let response = with_json(200, json!({"id": "r1"}));
        assert_eq!(PollingMethod::select(&Method::PUT, &response), PollingMethod::Done);
        assert_eq!(
            PollingMethod::select(&Method::POST, &HttpResponse::new(201)),
            PollingMethod::Done
        );
    }

    #[test]
    fn test_operation_resource_status() {
        let method = PollingMethod::OperationResource {
            header: headers::AZURE_ASYNC_OPERATION.to_string(),
        };
        let running = with_json(200, json!({"status": "InProgress"}));
        assert_eq!(method.status_of(&running).unwrap(), OperationStatus::InProgress);

        let done = with_json(200, json!({"status": "Succeeded"}));
        assert_eq!(method.status_of(&done).unwrap(), OperationStatus::Succeeded);

        // no explicit status: fall back to the status code
        assert_eq!(
            method.status_of(&HttpResponse::new(202)).unwrap(),
            OperationStatus::InProgress
        );
        assert_eq!(
            method.status_of(&with_json(200, json!({}))).unwrap(),
            OperationStatus::Succeeded
        );

        let garbage = HttpResponse::new(200).with_body("<html>");
        assert!(matches!(
            method.status_of(&garbage),
            Err(LroError::BadResponse(_))
        ));
    }

    #[test]
    fn test_location_status_ignores_body() {
        let response = with_json(200, json!({"status": "Failed"}));
        assert_eq!(
            PollingMethod::Location.status_of(&response).unwrap(),
            OperationStatus::Succeeded
        );
        assert_eq!(
            PollingMethod::Location.status_of(&HttpResponse::new(202)).unwrap(),
            OperationStatus::InProgress
        );
    }

    #[test]
    fn test_body_status() {
        let response = with_json(200, json!({"provisioningState": "Failed"}));
        assert_eq!(
            PollingMethod::Body.status_of(&response).unwrap(),
            OperationStatus::Failed
        );
    }

    #[test]
    fn test_non_success_poll_is_error() {
        let err = PollingMethod::Location
            .status_of(&HttpResponse::new(404))
            .unwrap_err();
        assert!(matches!(err, LroError::UnexpectedStatus { status: 404, .. }));
    }

    #[test]
    fn test_tracking_header() {
        assert_eq!(PollingMethod::Location.tracking_header(), Some("location"));
        assert_eq!(PollingMethod::Body.tracking_header(), None);
    }
}
