use std::sync::Arc;
use std::time::Duration;

use longcut_core::{RejectKind, RuleScope, RuleTable, Tier};

use crate::audit::ValidatorResult;
use crate::config::schema::MAX_HEALTH_FRESHNESS_MS;
use crate::config::GatewayConfig;
use crate::context::RequestContext;
use crate::obs::PipelineMetrics;
use crate::policy::{EndpointPolicy, GateContext, GateOutcome, GateRunner, GateVerdict, PolicyGate, PolicyGates};
use crate::registry::Registries;
use crate::resolve::TransformationResolver;

use super::rejection::Rejection;
use super::stage::StageResult;

/// Everything the stages read. Built once, shared by all tiers.
pub struct PipelineEnv {
    pub registries: Arc<Registries>,
    pub gates: PolicyGates,
    pub runner: GateRunner,
    pub resolver: TransformationResolver,
    pub endpoint: EndpointPolicy,
    pub micro_rules: RuleTable,
    pub default_ecosystem: String,
    pub default_service: String,
    pub health_freshness: chrono::Duration,
    pub wallet: String,
    pub metrics: Arc<PipelineMetrics>,
}

impl PipelineEnv {
    pub fn new(
        cfg: &GatewayConfig,
        registries: Arc<Registries>,
        gates: PolicyGates,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        let micro_rules = cfg
            .micro
            .rules
            .iter()
            .map(|r| r.compile(RuleScope::Endpoint, false))
            .collect();

        Self {
            registries,
            gates,
            runner: GateRunner::new(
                Duration::from_millis(cfg.gateway.gate_timeout_ms),
                Arc::clone(&metrics),
            ),
            resolver: TransformationResolver::new(cfg.gateway.max_resolution_depth),
            endpoint: EndpointPolicy::new(&cfg.micro),
            micro_rules,
            default_ecosystem: cfg.macro_tier.default_ecosystem.clone(),
            default_service: cfg.mezzo.default_service.clone(),
            health_freshness: freshness_window(cfg.gateway.health_freshness_ms),
            wallet: cfg.gateway.wallet.clone(),
            metrics,
        }
    }

    /// Gate context pre-filled with what every gate sees.
    pub fn gate_context(&self, tier: Tier, ctx: &RequestContext) -> GateContext {
        GateContext::new(tier, ctx.correlation_id, &ctx.method, &ctx.path).with_wallet(&self.wallet)
    }

    /// Run one gate and record its result on the context.
    ///
    /// `Ok` carries the gate's decision, accepting or not. Timeouts become
    /// `DependencyUnavailable`, panics `InternalPipelineError`.
    pub async fn verdict(
        &self,
        gate: &Arc<dyn PolicyGate>,
        gctx: &GateContext,
        ctx: &mut RequestContext,
    ) -> Result<GateOutcome, StageResult> {
        let tier = gctx.tier;
        let name = gate.name();
        let verdict = self.runner.run(gate.as_ref(), gctx, &ctx.cancel).await;

        let (accepted, reason) = match &verdict {
            GateVerdict::Decided(o) => (o.accepted, o.reason.clone()),
            GateVerdict::TimedOut => (false, "timed out".to_string()),
            GateVerdict::Panicked => (false, "internal error".to_string()),
            GateVerdict::Cancelled => return Err(StageResult::Cancelled),
        };
        ctx.push_validator(
            tier,
            ValidatorResult {
                gate: name.to_string(),
                accepted,
                reason,
            },
        );

        match verdict {
            GateVerdict::Decided(o) => Ok(o),
            GateVerdict::TimedOut => Err(StageResult::Reject(
                Rejection::new(
                    tier,
                    RejectKind::DependencyUnavailable,
                    format!("{name} gate timed out after {}ms", self.runner.timeout().as_millis()),
                )
                .with_detail("failedDependencies", vec![name.to_string()]),
            )),
            GateVerdict::Panicked => Err(StageResult::Reject(Rejection::internal(
                tier,
                format!("{name} gate panicked"),
            ))),
            GateVerdict::Cancelled => Err(StageResult::Cancelled),
        }
    }

    /// [`verdict`](Self::verdict), with a denial turned into the rejection
    /// built by `deny`.
    pub async fn consult(
        &self,
        gate: &Arc<dyn PolicyGate>,
        gctx: &GateContext,
        ctx: &mut RequestContext,
        deny: impl FnOnce(&GateOutcome) -> Rejection,
    ) -> Result<GateOutcome, StageResult> {
        let outcome = self.verdict(gate, gctx, ctx).await?;
        if outcome.accepted {
            Ok(outcome)
        } else {
            Err(StageResult::Reject(deny(&outcome)))
        }
    }
}

/// Config is validated to at most a day; anything larger saturates there.
fn freshness_window(ms: u64) -> chrono::Duration {
    i64::try_from(ms.min(MAX_HEALTH_FRESHNESS_MS))
        .ok()
        .and_then(chrono::Duration::try_milliseconds)
        .unwrap_or_else(chrono::Duration::zero)
}
