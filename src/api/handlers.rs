//! Request handlers.

use axum::extract::{Path, RawQuery, Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use axum::Json;
use serde_json::{json, Value};

use super::error::ApiError;
use super::AppState;
use crate::models::{Projection, ResultEnvelope};

/// Decode a raw query string into ordered key/value pairs
pub fn query_pairs(raw: Option<&str>) -> Vec<(String, String)> {
    raw.map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default()
}

/// `GET /`
pub async fn handle_search(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
) -> Result<Json<ResultEnvelope>, ApiError> {
    let pairs = query_pairs(raw.as_deref());
    tracing::debug!(parameters = pairs.len(), "search request");

    let envelope = state.service.search_pairs(pairs).await?;
    Ok(Json(envelope))
}

/// `GET /{id}`
pub async fn handle_get_paper(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Projection>, ApiError> {
    tracing::debug!(id = %id, "paper request");
    let projection = state.service.get(&id).await?;
    Ok(Json(projection))
}

/// `GET /status`
pub async fn handle_status(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    match state.service.health().await {
        Ok(()) => Ok(Json(json!({ "status": "ok", "store": state.service.store_id() }))),
        Err(e) => {
            tracing::warn!(error = %e, "health check failed");
            Err(ApiError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "The document store is not available",
            ))
        }
    }
}

/// Whether a header value is `Bearer <token>` with a well-formed token
pub fn is_bearer(value: &str) -> bool {
    let Some((scheme, token)) = value.split_once(' ') else {
        return false;
    };
    let token = token.trim();
    let body = token.trim_end_matches('=');

    scheme.eq_ignore_ascii_case("bearer")
        && !body.is_empty()
        && body
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~' | '+' | '/'))
}

/// Reject requests without a bearer token when the service requires one
pub async fn require_bearer(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if state.auth.require_bearer_token {
        let authorized = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .is_some_and(is_bearer);
        if !authorized {
            return Err(ApiError::unauthorized("A bearer token is required"));
        }
    }
    Ok(next.run(request).await)
}
