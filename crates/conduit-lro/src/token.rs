//! Continuation tokens.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::LroError;
use crate::operation::LongRunningOperation;

const TOKEN_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct TokenPayload {
    version: u32,
    operation: LongRunningOperation,
}

/// Opaque, URL-safe snapshot of an operation's polling state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContinuationToken(String);

impl ContinuationToken {
    pub fn encode(operation: &LongRunningOperation) -> Result<Self, LroError> {
        let payload = TokenPayload {
            version: TOKEN_VERSION,
            operation: operation.clone(),
        };
        let json = serde_json::to_vec(&payload)
            .map_err(|e| LroError::InvalidContinuationToken(e.to_string()))?;
        Ok(Self(URL_SAFE_NO_PAD.encode(json)))
    }

    pub fn decode(&self) -> Result<LongRunningOperation, LroError> {
        let json = URL_SAFE_NO_PAD
            .decode(self.0.trim())
            .map_err(|e| LroError::InvalidContinuationToken(format!("not base64: {}", e)))?;
        let payload: TokenPayload = serde_json::from_slice(&json)
            .map_err(|e| LroError::InvalidContinuationToken(format!("malformed: {}", e)))?;

        if payload.version != TOKEN_VERSION {
            return Err(LroError::InvalidContinuationToken(format!(
                "unsupported version {}",
                payload.version
            )));
        }
        Ok(payload.operation)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<String> for ContinuationToken {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl From<&str> for ContinuationToken {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}

impl fmt::Display for ContinuationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_common_http::{HttpRequest, HttpResponse, Method};
    use std::time::Duration;

    fn operation() -> LongRunningOperation {
        LongRunningOperation::from_initial(
            &HttpRequest::new(Method::PUT, "https://x/res").header("x-ms-client-request-id", "abc"),
            &HttpResponse::new(202)
                .with_header("Azure-AsyncOperation", "https://x/op1")
                .with_header("Retry-After", "3"),
            Duration::from_secs(30),
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_token_restores_state() {
        let operation = operation();
        let token = ContinuationToken::encode(&operation).unwrap();

        let restored = ContinuationToken::from(token.to_string()).decode().unwrap();
        assert_eq!(restored, operation);
    }

    #[test]
    fn test_token_is_url_safe() {
        let token = ContinuationToken::encode(&operation()).unwrap();
        assert!(token
            .as_str()
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_garbage_is_rejected() {
        let err = ContinuationToken::from("not a token!").decode().unwrap_err();
        assert!(matches!(err, LroError::InvalidContinuationToken(_)));

        let json = URL_SAFE_NO_PAD.encode(br#"{"version":1}"#);
        let err = ContinuationToken::from(json).decode().unwrap_err();
        assert!(matches!(err, LroError::InvalidContinuationToken(_)));
    }

    #[test]
    fn test_future_version_is_rejected() {
        let payload = serde_json::json!({
            "version": 99,
            "operation": serde_json::to_value(operation()).unwrap(),
        });
        let token = ContinuationToken::from(URL_SAFE_NO_PAD.encode(payload.to_string()));
        let err = token.decode().unwrap_err();
        assert!(err.to_string().contains("unsupported version 99"));
    }
}
