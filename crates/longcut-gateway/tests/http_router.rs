#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use longcut_gateway::app_state::AppState;
use longcut_gateway::config::{self, GatewayConfig};
use longcut_gateway::router::build_router;

fn app() -> Router {
    build_router(state())
}

fn state() -> AppState {
    AppState::new(config::load_builtin().unwrap()).unwrap()
}

fn bearer(state: &AppState) -> String {
    format!("Bearer {}", state.issuer().issue("ada", vec![]).unwrap())
}

fn with_login(secret: Option<&str>) -> GatewayConfig {
    let mut cfg = config::load_builtin().unwrap();
    cfg.micro.login_enabled = true;
    cfg.micro.jwt_secret = secret.map(str::to_string);
    cfg
}

async fn json_body(res: axum::response::Response) -> Value {
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn healthz_ok() {
    let res = app()
        .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn security_status_lists_tiers() {
    let res = app()
        .oneshot(Request::get("/security/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body = json_body(res).await;
    let tiers = body["tiers"].as_array().unwrap();
    assert_eq!(tiers.len(), 3);
    assert_eq!(body["health"]["services"], 5);
    assert!(body["services"]
        .as_array()
        .unwrap()
        .iter()
        .any(|s| s == "offstar-multi-bridge"));
}

#[tokio::test]
async fn validated_request_carries_headers() {
    let state = state();
    let res = build_router(state.clone())
        .oneshot(
            Request::post("/api/users")
                .header("authorization", bearer(&state))
                .header("content-type", "application/json")
                .header("x-correlation-id", "7d3f4a9e-1c2b-4d5e-8f60-0a1b2c3d4e5f")
                .body(Body::from(r#"{"name":"<i>ada</i>"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let headers = res.headers().clone();
    assert_eq!(
        headers.get("x-correlation-id").unwrap(),
        "7d3f4a9e-1c2b-4d5e-8f60-0a1b2c3d4e5f"
    );
    assert_eq!(headers.get("x-transformation").unwrap(), "SHORTCUT_TO_LONGCUT");
    assert_eq!(headers.get("x-security-level").unwrap(), "MICRO");
    assert_eq!(headers.get("x-ecosystem").unwrap(), "offstar-ecosystem");
    assert_eq!(headers.get("x-wallet-context").unwrap(), "0x21cC3046...");
    assert!(headers.contains_key("x-orchestration-id"));

    let body = json_body(res).await;
    assert_eq!(body["status"], "validated");
    assert_eq!(body["longcut"], "/secure/authenticated/api/v1/validated/users");
    assert_eq!(body["body"]["name"], "ada");
}

#[tokio::test]
async fn missing_token_is_401() {
    let res = app()
        .oneshot(Request::get("/api/users").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert!(res.headers().contains_key("x-correlation-id"));

    let body = json_body(res).await;
    assert_eq!(body["kind"], "AuthenticationFailure");
    assert_eq!(body["securityLevel"], "MICRO_BLOCKED");
    assert_eq!(body["error"], "Access denied: No token provided");
}

#[tokio::test]
async fn invalid_token_is_403() {
    let res = app()
        .oneshot(
            Request::get("/api/users")
                .header("authorization", "Bearer abc")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let body = json_body(res).await;
    assert_eq!(body["securityLevel"], "MICRO_REJECTED");
    assert_eq!(body["error"], "Access denied: Invalid token");
}

#[tokio::test]
async fn login_issues_a_usable_token() {
    let app = build_router(AppState::new(with_login(Some("router-test-secret-router-test-secret"))).unwrap());

    let res = app
        .clone()
        .oneshot(
            Request::post("/auth/login")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"userId":"grace"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = json_body(res).await;
    assert_eq!(body["message"], "Authentication successful");
    assert_eq!(body["security_level"], "AUTHENTICATED");
    let token = body["token"].as_str().unwrap().to_string();

    let res = app
        .oneshot(
            Request::get("/api/users")
                .header("authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn login_without_secret_still_verifies() {
    let app = build_router(AppState::new(with_login(None)).unwrap());

    let res = app
        .clone()
        .oneshot(Request::post("/auth/login").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let token = json_body(res).await["token"].as_str().unwrap().to_string();

    let res = app
        .oneshot(
            Request::get("/api/users")
                .header("authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn login_route_is_off_by_default() {
    let res = app()
        .oneshot(Request::post("/auth/login").body(Body::empty()).unwrap())
        .await
        .unwrap();
    // falls through to the pipeline, which wants a token
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn body_over_limit_is_413_from_the_pipeline() {
    let mut cfg = config::load_builtin().unwrap();
    cfg.micro.max_body_bytes = 16;
    let state = AppState::new(cfg).unwrap();

    let res = build_router(state.clone())
        .oneshot(
            Request::post("/api/users")
                .header("authorization", bearer(&state))
                .body(Body::from(vec![b'x'; 64]))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);

    let body = json_body(res).await;
    assert_eq!(body["kind"], "OversizedRequest");
    assert_eq!(body["securityLevel"], "MICRO_SIZE_LIMIT");
    assert_eq!(state.dispatcher().audit(longcut_core::Tier::Micro).len(), 1);
}

#[tokio::test]
async fn body_above_axum_default_limit_reaches_the_pipeline() {
    let state = state();
    let res = build_router(state.clone())
        .oneshot(
            Request::post("/api/users")
                .header("authorization", bearer(&state))
                .body(Body::from(vec![b'x'; 3 * 1024 * 1024]))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json_body(res).await["kind"], "OversizedRequest");
}

#[tokio::test]
async fn unknown_service_is_404() {
    let state = state();
    let res = build_router(state.clone())
        .oneshot(
            Request::get("/api/users")
                .header("authorization", bearer(&state))
                .header("x-service-name", "nobody")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let body = json_body(res).await;
    assert_eq!(body["kind"], "ServiceNotFound");
    assert_eq!(body["service"], "nobody");
}

#[tokio::test]
async fn metrics_render_after_traffic() {
    let app = app();
    app.clone()
        .oneshot(Request::get("/api/users").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let res = app
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let text = String::from_utf8(to_bytes(res.into_body(), usize::MAX).await.unwrap().to_vec()).unwrap();
    assert!(text.contains("longcut_rejections_total"));
}
