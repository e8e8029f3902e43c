//! HTTP routes for the gate operations.
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | `POST` | `/auth/authorize` | AuthorizeAction (body: action descriptor) |
//! | `POST` | `/auth/token/validate` | ValidateToken |
//! | `POST` | `/auth/login` | LogIn (body: `username`, `tokenHash`) |
//! | `GET` | `/health` | liveness |
//!
//! The credential travels in `Authorization: Bearer <token>`.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::{catch_panic::CatchPanicLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::audit::{self, AuditEvent};
use crate::error::{Error, ErrorCode};
use crate::gate::{ActionDescriptor, AuthGate, Credential, RequestContext};

/// Shared application state
pub struct AppState {
    /// The gate answering every request
    pub gate: AuthGate,
}

/// LogIn request body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    /// Username to echo back
    #[serde(default)]
    pub username: String,
    /// Token hash, used as the credential when no bearer token is sent
    #[serde(default)]
    pub token_hash: String,
}

/// Create the router
pub fn create_router(state: Arc<AppState>, request_timeout: Duration) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/auth/authorize", post(authorize_handler))
        .route("/auth/token/validate", post(validate_token_handler))
        .route("/auth/login", post(login_handler))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Build the gate context from request headers
fn request_context(headers: &HeaderMap) -> RequestContext {
    let mut ctx = RequestContext::new();
    if let Some(credential) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(Credential::from_authorization)
    {
        ctx = ctx.with_credential(credential);
    }
    let request_id = headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| uuid::Uuid::new_v4().to_string(), str::to_string);
    ctx.with_request_id(request_id)
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `POST /auth/authorize`
async fn authorize_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<ActionDescriptor>, JsonRejection>,
) -> Response {
    const OPERATION: &str = "authorize_action";
    let ctx = request_context(&headers);
    if ctx.credential().is_none() {
        return reject(OPERATION, &ctx, &Error::Unauthenticated, json!({ "authorized": false }));
    }
    let action = match body {
        Ok(Json(action)) => action,
        Err(rejection) => {
            let err = Error::InvalidRequest(rejection.body_text());
            return reject(OPERATION, &ctx, &err, json!({ "authorized": false }));
        }
    };
    match state.gate.authorize_action(Some(&ctx), &action).await {
        Ok(verdict) => Json(json!({ "authorized": verdict.allowed })).into_response(),
        Err(e) => error_response(&e, json!({ "authorized": false })),
    }
}

/// `POST /auth/token/validate`
async fn validate_token_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    let ctx = request_context(&headers);
    match state.gate.validate_token(Some(&ctx)).await {
        Ok(info) => Json(info).into_response(),
        Err(e) => error_response(&e, json!({})),
    }
}

/// `POST /auth/login`
///
/// Without a bearer token the credential comes from the body, so an
/// unreadable body leaves the caller unauthenticated.
async fn login_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Response {
    const OPERATION: &str = "log_in";
    let ctx = request_context(&headers);
    let body = match body {
        Ok(Json(body)) => body,
        Err(_) if ctx.credential().is_none() => {
            return reject(OPERATION, &ctx, &Error::Unauthenticated, json!({}));
        }
        Err(rejection) => {
            let err = Error::InvalidRequest(rejection.body_text());
            return reject(OPERATION, &ctx, &err, json!({}));
        }
    };
    match state
        .gate
        .log_in(Some(&ctx), &body.username, &body.token_hash)
        .await
    {
        Ok(info) => Json(info).into_response(),
        Err(e) => error_response(&e, json!({})),
    }
}

/// Refuse a request before it reaches the gate, keeping the audit trail complete
fn reject(operation: &'static str, ctx: &RequestContext, err: &Error, body: Value) -> Response {
    audit::emit(&AuditEvent::failed(operation, Some(ctx), None, err));
    error_response(err, body)
}

/// HTTP status for an error code
#[must_use]
pub fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::Unauthenticated => StatusCode::UNAUTHORIZED,
        ErrorCode::PermissionDenied => StatusCode::FORBIDDEN,
        ErrorCode::InvalidRequest => StatusCode::BAD_REQUEST,
        ErrorCode::Upstream => StatusCode::BAD_GATEWAY,
        ErrorCode::ConfigurationFault | ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Render `err` as `{"error": {"code", "message"}}` merged into `body`
fn error_response(err: &Error, mut body: Value) -> Response {
    let code = err.code();
    body["error"] = json!({
        "code": code.as_str(),
        "message": err.to_string(),
    });
    let status = status_for(code);
    if code == ErrorCode::Unauthenticated {
        (status, [(header::WWW_AUTHENTICATE, "Bearer")], Json(body)).into_response()
    } else {
        (status, Json(body)).into_response()
    }
}
