//! Axum route handlers for the Bebop compiler gateway.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, FromRequest, Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use tower_http::{set_header::SetResponseHeaderLayer, trace::TraceLayer};

use bebop_core::{CompilationRequest, InvocationArguments, RequestId};
use bebop_sandbox::{CompilerModule, ProcessInvoker, VirtualChannels};

use crate::compose::{compose, preflight};
use crate::error::GatewayError;

// ── Shared state ─────────────────────────────────────────────────────────────

/// State shared by every request.
#[derive(Clone)]
pub struct AppState {
    /// Launches and tracks compiler invocations.
    pub invoker: Arc<ProcessInvoker>,
    /// `argv[0]` passed to the compiler.
    pub program_name: Arc<str>,
}

impl AppState {
    /// Build state around a compiler module.
    #[must_use]
    pub fn new(module: Arc<dyn CompilerModule>, program_name: &str) -> Self {
        Self {
            invoker: Arc::new(ProcessInvoker::new(module)),
            program_name: Arc::from(program_name),
        }
    }
}

// ── Router ────────────────────────────────────────────────────────────────────

/// Build the application router.
///
/// `max_body_bytes` bounds `POST` bodies only; the compile handler picks the
/// method before reading the body. Every response carries the fixed CORS
/// headers.
pub fn create_router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/", any(compile))
        .route("/health", get(health))
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("POST, OPTIONS"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type"),
        ))
}

// ── Handlers ──────────────────────────────────────────────────────────────────

/// `GET /health`: liveness probe.
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({"status": "ok"})))
}

/// `/`: compile a schema.
///
/// The method is dispatched before the body is read. `OPTIONS` answers the
/// preflight with 204 and any other non-`POST` method gets 405, whatever the
/// body holds or however large it is. `POST` reads the body under the
/// configured limit, validates it, launches the compiler in the background
/// and responds as soon as the diagnostics channel shows whether it failed.
///
/// # Errors
/// Returns [`GatewayError::MethodNotAllowed`] for any other method,
/// [`GatewayError::BodyRejected`] for an oversized or unreadable body, and
/// [`GatewayError::InvalidBody`] or [`GatewayError::InvalidGenerator`] for a
/// bad request. Compiler diagnostics are returned through the composed
/// response, not as an `Err`.
pub async fn compile(
    State(state): State<AppState>,
    request: Request,
) -> Result<Response, GatewayError> {
    let method = request.method().clone();
    if method == Method::OPTIONS {
        return Ok(preflight());
    }
    if method != Method::POST {
        return Err(GatewayError::MethodNotAllowed(method));
    }

    let body = Bytes::from_request(request, &state).await?;
    let request = CompilationRequest::from_json(&body)?;
    let request_id = RequestId::new();
    let args = InvocationArguments::build(&state.program_name, &request);
    let (stdio, host) = VirtualChannels::open(&request.schema).split();

    state.invoker.launch(request_id, &request, args, stdio);
    let outcome = host.classify().await;

    tracing::info!(
        request_id = %request_id,
        generator = %request.generator,
        out_file = %request.out_file,
        success = outcome.is_success(),
        "compile outcome classified"
    );
    Ok(compose(outcome))
}
