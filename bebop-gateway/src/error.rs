//! Error types for the gateway crate.

use axum::{
    extract::rejection::BytesRejection,
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::json;

use bebop_core::CoreError;

/// Content type of every JSON response, generated code included.
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Errors that end a request with a JSON `{"error": ...}` body.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum GatewayError {
    /// The method is neither `POST` nor `OPTIONS`.
    #[error("Method not allowed: {0}")]
    MethodNotAllowed(Method),

    /// The body is not a well-formed compile request.
    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    /// The generator is missing or unsupported.
    #[error("Invalid generator")]
    InvalidGenerator,

    /// The compiler rejected the schema. Carries its diagnostics verbatim.
    #[error("{0}")]
    CompilationDiagnostic(String),

    /// The `POST` body could not be read, usually because it exceeds the
    /// configured limit.
    #[error("{}", .0.body_text())]
    BodyRejected(BytesRejection),
}

impl From<BytesRejection> for GatewayError {
    fn from(rejection: BytesRejection) -> Self {
        GatewayError::BodyRejected(rejection)
    }
}

impl From<CoreError> for GatewayError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidGenerator => GatewayError::InvalidGenerator,
            CoreError::InvalidBody { reason } => GatewayError::InvalidBody(reason),
            other => GatewayError::InvalidBody(other.to_string()),
        }
    }
}

impl GatewayError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            GatewayError::InvalidBody(_) | GatewayError::InvalidGenerator => {
                StatusCode::BAD_REQUEST
            }
            GatewayError::CompilationDiagnostic(_) => StatusCode::UNPROCESSABLE_ENTITY,
            GatewayError::BodyRejected(rejection) => rejection.status(),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = json!({"error": self.to_string()}).to_string();
        (status, [(header::CONTENT_TYPE, JSON_CONTENT_TYPE)], body).into_response()
    }
}
