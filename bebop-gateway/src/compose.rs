//! Turns a classified compile outcome into an HTTP response.
//!
//! | Outcome | Status | Body |
//! |---|---|---|
//! | no diagnostics | 200 | compiler stdout, streamed as it is produced |
//! | diagnostics | 422 | `{"error": <diagnostics>}` |
//!
//! A stdout stream that ends in an abort marker surfaces as a body error,
//! which tears the connection down instead of completing the 200.

use axum::{
    body::Body,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use bebop_core::Outcome;
use bebop_sandbox::ByteReceiver;

use crate::error::{GatewayError, JSON_CONTENT_TYPE};

/// Build the response for a classified outcome.
#[must_use]
pub fn compose(outcome: Outcome<ByteReceiver>) -> Response {
    match outcome {
        Outcome::Success(stdout) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, JSON_CONTENT_TYPE)],
            Body::from_stream(stdout.into_stream()),
        )
            .into_response(),
        Outcome::Failure(diagnostics) => {
            GatewayError::CompilationDiagnostic(diagnostics).into_response()
        }
    }
}

/// Response to a CORS preflight: no body.
#[must_use]
pub fn preflight() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

#[cfg(test)]
mod tests {
    use bebop_sandbox::byte_channel;

    use super::*;

    async fn body_bytes(resp: Response) -> Result<axum::body::Bytes, axum::Error> {
        axum::body::to_bytes(resp.into_body(), usize::MAX).await
    }

    #[tokio::test]
    async fn success_streams_stdout_with_json_content_type() {
        let (tx, rx) = byte_channel();
        let resp = compose(Outcome::Success(rx));
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).map(|v| v.as_bytes()),
            Some(JSON_CONTENT_TYPE.as_bytes())
        );

        // written after the response exists: the body is live
        tx.write(b"{\"result\":");
        tx.write(b"{}}");
        drop(tx);
        let bytes = match body_bytes(resp).await {
            Ok(b) => b,
            Err(e) => panic!("failed to read body: {e}"),
        };
        assert_eq!(&bytes[..], b"{\"result\":{}}");
    }

    #[tokio::test]
    async fn failure_wraps_diagnostics_in_error_field() {
        let resp = compose(Outcome::Failure("error: bad token".to_owned()));
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let bytes = match body_bytes(resp).await {
            Ok(b) => b,
            Err(e) => panic!("failed to read body: {e}"),
        };
        let body: serde_json::Value = match serde_json::from_slice(&bytes) {
            Ok(v) => v,
            Err(e) => panic!("invalid JSON: {e}"),
        };
        assert_eq!(body["error"], "error: bad token");
    }

    #[tokio::test]
    async fn aborted_stdout_fails_the_body() {
        let (tx, rx) = byte_channel();
        tx.write(b"{\"partial\":");
        tx.abort("sandbox violation");
        drop(tx);
        let resp = compose(Outcome::Success(rx));
        assert!(body_bytes(resp).await.is_err(), "aborted stream must not complete");
    }

    #[test]
    fn preflight_is_no_content() {
        assert_eq!(preflight().status(), StatusCode::NO_CONTENT);
    }
}
