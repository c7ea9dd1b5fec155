//! Axum router wiring.
//!
//! Ops endpoints are routed explicitly; every other request falls through to
//! the pipeline handler. `/auth/login` exists only when enabled in config.

use axum::{
    routing::{get, post},
    Router,
};

use crate::{app_state::AppState, ops, transport};

pub fn build_router(state: AppState) -> Router {
    let mut router: Router<AppState> = Router::new()
        .route("/healthz", get(ops::healthz))
        .route("/metrics", get(ops::metrics))
        .route("/security/status", get(ops::security_status));

    if state.cfg().micro.login_enabled {
        router = router.route("/auth/login", post(ops::login));
    }

    router
        .fallback(transport::http::pipeline_handler)
        .with_state(state)
}
