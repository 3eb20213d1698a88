// Slack signature, diagnostic API key, request id, and CORS middleware

use axum::{
    body::{self, Body},
    extract::State,
    http::{HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use tower_http::cors::{Any, CorsLayer};
use tracing::Instrument;

use crate::error::ApiError;
use crate::routes::AppState;
use crate::slack::verify::constant_time_eq;
use crate::slack::{verify_signature, SIGNATURE_HEADER, TIMESTAMP_HEADER};

/// Slack form bodies are small; anything bigger is not from Slack
const MAX_SLACK_BODY_BYTES: usize = 1024 * 1024;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Slack signature middleware
///
/// Buffers the raw body, checks `X-Slack-Signature` against it, and hands
/// the same bytes on to the handler.
pub async fn slack_signature_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let (parts, body) = request.into_parts();
    let bytes = body::to_bytes(body, MAX_SLACK_BODY_BYTES)
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read request body: {}", e)))?;

    let header = |name: &str| parts.headers.get(name).and_then(|v| v.to_str().ok());

    if let Err(err) = verify_signature(
        &state.config.slack_signing_secret,
        header(TIMESTAMP_HEADER),
        header(SIGNATURE_HEADER),
        &bytes,
        Utc::now().timestamp(),
    ) {
        tracing::warn!(
            "Rejected Slack request {} {}: {}",
            parts.method,
            parts.uri.path(),
            err
        );
        return Err(err.into());
    }

    Ok(next.run(Request::from_parts(parts, Body::from(bytes))).await)
}

/// Diagnostic route guard
///
/// Hidden (404) in production, 503 when no `TEST_API_KEY` is configured.
/// Accepts the key as `X-Api-Key: {key}` or `Authorization: Bearer {key}`.
pub async fn diagnostic_auth_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    if state.config.is_production() {
        return Err(ApiError::NotFound);
    }

    let expected = match state.config.test_api_key.as_deref() {
        Some(key) => key,
        None => {
            return Err(ApiError::ServiceUnavailable(
                "Diagnostic endpoints are disabled (TEST_API_KEY not set)".to_string(),
            ))
        }
    };

    let bearer = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    let api_key = request
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok());

    let authorized = [bearer, api_key]
        .into_iter()
        .flatten()
        .any(|candidate| constant_time_eq(candidate.as_bytes(), expected.as_bytes()));

    if authorized {
        return Ok(next.run(request).await);
    }

    tracing::warn!(
        "Access attempt with invalid or missing API key: {} {}",
        request.method(),
        request.uri().path()
    );
    Err(ApiError::AuthError("Invalid or missing API Key".to_string()))
}

/// Tag every request with an id, both in the tracing span and the response
pub async fn request_id_middleware(request: Request<Body>, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path()
    );

    let mut response = next.run(request).instrument(span).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// Create CORS middleware layer
///
/// Configures CORS to allow all origins, methods, and headers.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}
