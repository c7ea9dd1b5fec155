//! Shared application state for the longcut gateway.
//!
//! Builds the registries, gates and dispatcher from config once at startup.
//! Startup errors are returned, never panicked on.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use longcut_core::error::{LongcutError, Result};
use longcut_core::Tier;

use crate::config::GatewayConfig;
use crate::dispatch::UnifiedDispatcher;
use crate::obs::PipelineMetrics;
use crate::policy::{JwtAuthenticator, PolicyGates};
use crate::registry::{spawn_heartbeat, Registries};

const FAIL_FAST_ON_DANGLING: bool = false; // if changed to true, boot fails.

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: GatewayConfig,
    dispatcher: Arc<UnifiedDispatcher>,
    issuer: Arc<JwtAuthenticator>,
    shutdown: CancellationToken,
}

impl AppState {
    /// Build state with the default gates. Login tokens verify against the
    /// authentication gate.
    pub fn new(cfg: GatewayConfig) -> Result<Self> {
        let issuer = Arc::new(JwtAuthenticator::from_config(&cfg.micro, &cfg.gateway.wallet));
        let gates = PolicyGates::new(issuer.clone());
        Self::build(cfg, gates, issuer)
    }

    /// Custom gates. The login issuer still signs with `micro.jwt_secret`.
    pub fn with_gates(cfg: GatewayConfig, gates: PolicyGates) -> Result<Self> {
        let issuer = Arc::new(JwtAuthenticator::from_config(&cfg.micro, &cfg.gateway.wallet));
        Self::build(cfg, gates, issuer)
    }

    fn build(cfg: GatewayConfig, gates: PolicyGates, issuer: Arc<JwtAuthenticator>) -> Result<Self> {
        let registries = Arc::new(Registries::from_config(&cfg));

        // dependency / membership sanity check
        for (owner, missing) in registries.dangling_references() {
            tracing::warn!(%owner, %missing, "reference to unregistered service");
            if FAIL_FAST_ON_DANGLING {
                return Err(LongcutError::Config(format!(
                    "{owner} references unregistered service {missing}"
                )));
            }
        }
        if !registries.ecosystems.snapshot().contains(&cfg.macro_tier.default_ecosystem) {
            tracing::warn!(ecosystem = %cfg.macro_tier.default_ecosystem, "default ecosystem is not registered");
        }
        if !registries.services.snapshot().contains(&cfg.mezzo.default_service) {
            tracing::warn!(
                service = %cfg.mezzo.default_service,
                "default service is not registered; requests without x-service-name will be refused"
            );
        }

        let dispatcher = UnifiedDispatcher::new(
            &cfg,
            registries,
            gates,
            Arc::new(PipelineMetrics::default()),
        );

        tracing::info!(
            ecosystems = dispatcher.registries().ecosystems.len(),
            services = dispatcher.registries().services.len(),
            "gateway state ready"
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                cfg,
                dispatcher: Arc::new(dispatcher),
                issuer,
                shutdown: CancellationToken::new(),
            }),
        })
    }

    pub fn cfg(&self) -> &GatewayConfig {
        &self.inner.cfg
    }

    pub fn dispatcher(&self) -> Arc<UnifiedDispatcher> {
        Arc::clone(&self.inner.dispatcher)
    }

    pub fn issuer(&self) -> &JwtAuthenticator {
        &self.inner.issuer
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        self.inner.dispatcher.metrics()
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.inner.shutdown.clone()
    }

    /// Start the health heartbeat unless disabled by config.
    pub fn spawn_heartbeat(&self) -> Option<JoinHandle<()>> {
        let every = self.inner.cfg.gateway.heartbeat_interval_ms;
        if every == 0 {
            return None;
        }
        Some(spawn_heartbeat(
            Arc::clone(self.inner.dispatcher.registries()),
            Duration::from_millis(every),
            self.shutdown_token(),
        ))
    }

    /// Gauges rendered next to the pipeline metrics.
    pub fn metrics_extra(&self) -> Vec<(&'static str, u64)> {
        let d = &self.inner.dispatcher;
        let regs = d.registries();
        vec![
            ("longcut_registry_ecosystems", regs.ecosystems.len() as u64),
            ("longcut_registry_services", regs.services.len() as u64),
            ("longcut_audit_entries_macro", d.audit(Tier::Macro).len() as u64),
            ("longcut_audit_entries_mezzo", d.audit(Tier::Mezzo).len() as u64),
            ("longcut_audit_entries_micro", d.audit(Tier::Micro).len() as u64),
        ]
    }
}
