use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Application-specific error types.
#[derive(Debug, Clone)]
pub enum AppError {
    /// Bad request error (invalid input).
    BadRequest(String),
    /// A bank returned a non-success status or an error body matching the API contract.
    UpstreamApi {
        /// HTTP status returned by the bank. `None` when no response arrived
        /// (connection-level failure).
        status: Option<u16>,
        /// Call-scoped correlation id, if the bank echoed one back.
        correlation_id: Option<String>,
        /// Upstream error description.
        message: String,
    },
    /// A success response could not be decrypted or did not parse as the expected schema.
    Decryption {
        /// HTTP status of the original response.
        status: u16,
        /// Correlation id carried on the responding endpoint's headers, if any.
        correlation_id: Option<String>,
        /// Decryption failure description, including any partial plaintext.
        message: String,
    },
    /// A per-call deadline elapsed before the upstream answered.
    Timeout {
        /// The operation that timed out, e.g. "list accounts".
        operation: String,
    },
    /// Token acquisition against the bank's audience failed.
    Token(String),
    /// Customer registry or endpoint catalogue lookup failed.
    Registry(String),
    /// Internal server error.
    InternalError(String),
}

impl AppError {
    /// Whether this error belongs to the upstream-containable class: it is absorbed
    /// at account or bank granularity and never fails the whole aggregation.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            AppError::UpstreamApi { .. }
                | AppError::Decryption { .. }
                | AppError::Timeout { .. }
                | AppError::Token(_)
        )
    }

    /// Correlation id attached to the failing upstream call, when known.
    pub fn correlation_id(&self) -> Option<&str> {
        match self {
            AppError::UpstreamApi { correlation_id, .. }
            | AppError::Decryption { correlation_id, .. } => correlation_id.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::UpstreamApi {
                status, message, ..
            } => match status {
                Some(code) => write!(f, "Upstream API error (status {}): {}", code, message),
                None => write!(f, "Upstream API error (no response): {}", message),
            },
            AppError::Decryption {
                status, message, ..
            } => write!(f, "Decryption error (status {}): {}", status, message),
            AppError::Timeout { operation } => write!(f, "Deadline exceeded: {}", operation),
            AppError::Token(msg) => write!(f, "Token acquisition failed: {}", msg),
            AppError::Registry(msg) => write!(f, "Registry error: {}", msg),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    /// Converts the error into an HTTP response.
    ///
    /// Only request-level failures ever surface here: bank- and account-level
    /// failures are absorbed into the aggregate payload's `has_errors` flags.
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::UpstreamApi { .. } | AppError::Decryption { .. } => {
                tracing::error!("Upstream error reached the response boundary: {}", self);
                (
                    StatusCode::BAD_GATEWAY,
                    "External service error".to_string(),
                )
            }
            AppError::Timeout { operation } => {
                tracing::error!("Upstream call timed out: {}", operation);
                (
                    StatusCode::GATEWAY_TIMEOUT,
                    "External service timed out".to_string(),
                )
            }
            AppError::Token(msg) => {
                tracing::error!("Token acquisition failed: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    "External service error".to_string(),
                )
            }
            AppError::Registry(msg) => {
                tracing::error!("Registry lookup failed: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    "Customer registry unavailable".to_string(),
                )
            }
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_class_is_containable() {
        assert!(AppError::UpstreamApi {
            status: Some(500),
            correlation_id: None,
            message: "boom".into()
        }
        .is_upstream());
        assert!(AppError::Decryption {
            status: 200,
            correlation_id: Some("abc".into()),
            message: "bad envelope".into()
        }
        .is_upstream());
        assert!(AppError::Timeout {
            operation: "list accounts".into()
        }
        .is_upstream());
        assert!(AppError::Token("denied".into()).is_upstream());
    }

    #[test]
    fn unexpected_class_is_not_containable() {
        assert!(!AppError::BadRequest("x".into()).is_upstream());
        assert!(!AppError::Registry("x".into()).is_upstream());
        assert!(!AppError::InternalError("x".into()).is_upstream());
    }
}
