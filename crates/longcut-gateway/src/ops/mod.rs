//! Operational HTTP endpoints.
//!
//! - `/healthz`          : liveness
//! - `/metrics`          : Prometheus text format
//! - `/security/status`  : per-tier registry, audit and health summary (JSON)
//! - `POST /auth/login`  : issues a bearer token (only when `micro.login_enabled`)

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use serde_json::{json, Value};

use crate::app_state::AppState;

const DEFAULT_LOGIN_USER: &str = "demo_user";

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub async fn metrics(State(state): State<AppState>) -> Response {
    let extra = state.metrics_extra();
    let body = state.metrics().render(&extra);

    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
        .into_response()
}

pub async fn security_status(State(state): State<AppState>) -> Response {
    Json(state.dispatcher().status()).into_response()
}

/// Body `{"userId": ".."}` is optional.
pub async fn login(State(state): State<AppState>, body: Bytes) -> Response {
    let user = serde_json::from_slice::<Value>(&body)
        .ok()
        .and_then(|v| v.get("userId").and_then(Value::as_str).map(str::to_string))
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| DEFAULT_LOGIN_USER.to_string());

    let issuer = state.issuer();
    let permissions = ["read", "write", "admin"].iter().map(|p| p.to_string()).collect();
    match issuer.issue(&user, permissions) {
        Ok(token) => {
            tracing::info!(user = %user, "token issued");
            Json(json!({
                "token": token,
                "message": "Authentication successful",
                "wallet": issuer.wallet(),
                "expiresIn": issuer.ttl().as_secs(),
                "security_level": "AUTHENTICATED",
            }))
            .into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "token issue failed");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "Login failed" }))).into_response()
        }
    }
}
