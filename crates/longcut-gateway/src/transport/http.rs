//! Fallback HTTP handler feeding every non-ops request through the pipeline.
//!
//! Each request runs on its own task. The handler future holds a drop guard on
//! the request's cancellation token, so a client that disconnects mid-request
//! cancels whatever gate call is in flight.
//!
//! Bodies are read up to `micro.max_body_bytes` here instead of through axum's
//! default limit, so oversized requests reach the Micro size check.

use std::net::SocketAddr;

use axum::{
    body::{to_bytes, Body},
    extract::{ConnectInfo, State},
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use longcut_core::Tier;

use crate::app_state::AppState;
use crate::context::{headers, RequestContext};
use crate::dispatch::{DispatchOutcome, Dispatched};
use crate::pipeline::Rejection;

pub async fn pipeline_handler(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    method: Method,
    uri: Uri,
    req_headers: HeaderMap,
    body: Body,
) -> Response {
    // Read one byte past the limit so Micro sees the overflow and rejects it.
    let limit = state.cfg().micro.max_body_bytes.saturating_add(1);
    let (body, overflowed) = match to_bytes(body, limit).await {
        Ok(bytes) => (bytes, false),
        Err(e) => {
            tracing::debug!(error = %e, "request body not read in full");
            (Bytes::new(), true)
        }
    };

    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();

    let client = peer
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "anonymous".to_string());
    let mut ctx = build_context(&method, &uri, &req_headers, &body)
        .with_client(client)
        .with_cancel(cancel);
    if overflowed {
        ctx.content_length = Some(ctx.content_length.unwrap_or(0).max(limit));
    }
    let correlation_id = ctx.correlation_id;

    let dispatcher = state.dispatcher();
    let joined = tokio::spawn(async move { dispatcher.dispatch(ctx).await }).await;
    guard.disarm();

    match joined {
        Ok(dispatched) => into_response(dispatched),
        Err(e) => {
            tracing::error!(correlation_id = %correlation_id, error = %e, "pipeline task failed");
            let rejection = Rejection::internal(Tier::Micro, "pipeline task failed");
            let mut res = (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(rejection.body(correlation_id)),
            )
                .into_response();
            insert_header(res.headers_mut(), headers::CORRELATION_ID, &correlation_id.to_string());
            res
        }
    }
}

fn build_context(method: &Method, uri: &Uri, req_headers: &HeaderMap, body: &Bytes) -> RequestContext {
    let mut ctx = RequestContext::new(method.as_str(), uri.path());

    for (name, value) in req_headers {
        if let Ok(v) = value.to_str() {
            ctx = ctx.with_header(name.as_str(), v);
        }
    }
    if ctx.content_length.is_none() && !body.is_empty() {
        ctx.content_length = Some(body.len());
    }

    if !body.is_empty() {
        let parsed = serde_json::from_slice::<Value>(body)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()));
        ctx = ctx.with_body(parsed);
    }
    ctx
}

fn into_response(d: Dispatched) -> Response {
    let Dispatched { ctx, outcome, .. } = d;

    let (status, body) = match &outcome {
        DispatchOutcome::Passed => (StatusCode::OK, passed_body(&ctx)),
        DispatchOutcome::Rejected(rejection) => (
            StatusCode::from_u16(rejection.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            rejection.body(ctx.correlation_id),
        ),
        DispatchOutcome::Cancelled(tier) => (
            StatusCode::SERVICE_UNAVAILABLE,
            json!({
                "error": "Request cancelled",
                "tier": tier.as_str(),
                "correlationId": ctx.correlation_id.to_string(),
            }),
        ),
    };

    let mut res = (status, Json(body)).into_response();
    for (name, value) in &ctx.response_headers {
        insert_header(res.headers_mut(), name, value);
    }
    res
}

fn passed_body(ctx: &RequestContext) -> Value {
    let longcut = |t: Tier| ctx.transformation(t).map(|t| t.longcut.clone());
    json!({
        "status": "validated",
        "correlationId": ctx.correlation_id.to_string(),
        "path": ctx.path,
        "longcut": ctx.routed_path(),
        "ecosystem": ctx.macro_tier.ecosystem,
        "service": ctx.mezzo.service,
        "transformations": {
            "macro": longcut(Tier::Macro),
            "mezzo": longcut(Tier::Mezzo),
            "micro": longcut(Tier::Micro),
        },
        "ledgerReference": ctx.macro_tier.ledger_reference,
        "body": ctx.body,
    })
}

fn insert_header(map: &mut HeaderMap, name: &str, value: &str) {
    match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
        (Ok(n), Ok(v)) => {
            map.insert(n, v);
        }
        _ => tracing::warn!(header = name, "dropping response header with invalid name or value"),
    }
}

