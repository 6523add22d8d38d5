//! Axum-specific error types and mappings.
//!
//! Every error leaves the server as `{"error": <message>, "status": <code>}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use hostengine_proxy::{ProxyError, ValidationError};
use hostengine_runtime::SupervisorError;

/// Axum-specific error type.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Malformed request (unparseable body, missing fields).
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Well-formed request that violates the schema.
    #[error("Unprocessable request: {0}")]
    Unprocessable(String),

    /// The engine could not be reached.
    #[error("Bad gateway: {0}")]
    BadGateway(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl HttpError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::BadGateway(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
    status: u16,
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            Self::BadRequest(msg)
            | Self::Unprocessable(msg)
            | Self::BadGateway(msg)
            | Self::Internal(msg) => msg,
        };

        let body = ErrorBody {
            error: message,
            status: status.as_u16(),
        };
        (status, axum::Json(body)).into_response()
    }
}

impl From<SupervisorError> for HttpError {
    fn from(err: SupervisorError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<ProxyError> for HttpError {
    fn from(err: ProxyError) -> Self {
        match err {
            ProxyError::InvalidPath(path) => Self::BadRequest(format!("Invalid path: {path}")),
            ProxyError::Client(e) => Self::Internal(format!("HTTP client error: {e}")),
            other => {
                error!(error = %other, "Proxying to engine failed");
                Self::BadGateway(other.to_string())
            }
        }
    }
}

impl From<ValidationError> for HttpError {
    fn from(err: ValidationError) -> Self {
        Self::Unprocessable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn error_body_carries_message_and_status() {
        let response = HttpError::BadGateway("engine unreachable".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["error"], "engine unreachable");
        assert_eq!(json["status"], 502);
    }

    #[test]
    fn supervisor_failures_are_internal_errors() {
        let err: HttpError = SupervisorError::StartupTimedOut { attempts: 30 }.into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().contains("30 health checks"));
    }

    #[test]
    fn validation_failures_are_unprocessable() {
        let err: HttpError = ValidationError::EmptyMessages.into();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
