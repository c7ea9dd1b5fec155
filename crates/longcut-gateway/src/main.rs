//! longcut gateway binary.
//!
//! - Config from `LONGCUT_CONFIG` (path), otherwise the builtin definitions
//! - Ops endpoints plus the pipeline fallback on `gateway.listen`
//! - Health heartbeat until shutdown

use std::net::SocketAddr;

use tracing_subscriber::{fmt, EnvFilter};

use longcut_core::error::{LongcutError, Result};
use longcut_gateway::{app_state, config, router};

const CONFIG_ENV: &str = "LONGCUT_CONFIG";

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cfg = match std::env::var(CONFIG_ENV) {
        Ok(path) => {
            tracing::info!(%path, "loading config");
            config::load_from_file(&path)?
        }
        Err(_) => {
            tracing::info!("{CONFIG_ENV} not set, using builtin definitions");
            config::load_builtin()?
        }
    };
    let listen: SocketAddr = cfg
        .gateway
        .listen
        .parse()
        .map_err(|e| LongcutError::Config(format!("gateway.listen must be a valid SocketAddr: {e}")))?;

    let state = app_state::AppState::new(cfg)?;
    let shutdown = state.shutdown_token();
    let heartbeat = state.spawn_heartbeat();
    let app = router::build_router(state);

    tracing::info!(%listen, "longcut-gateway starting");
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| LongcutError::Internal(format!("failed to bind {listen}: {e}")))?;

    let serve_shutdown = shutdown.clone();
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = serve_shutdown.cancelled() => {}
            }
            tracing::info!("shutdown requested");
        })
        .await
        .map_err(|e| LongcutError::Internal(format!("server failed: {e}")))?;

    shutdown.cancel();
    if let Some(h) = heartbeat {
        let _ = h.await;
    }
    Ok(())
}
