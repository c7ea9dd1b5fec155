use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;

use longcut_core::Tier;

use crate::audit::{AuditSequencer, AuditTrail};
use crate::config::GatewayConfig;
use crate::context::RequestContext;
use crate::obs::PipelineMetrics;
use crate::pipeline::{macro_tier, mezzo_tier, micro_tier};
use crate::pipeline::{PipelineEnv, Rejection, TierOutcome, TierPipeline, TierReport};
use crate::policy::PolicyGates;
use crate::registry::Registries;

use super::status::{self, StatusReport};

#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    /// All three tiers passed; hand the context to the downstream router.
    Passed,
    Rejected(Rejection),
    Cancelled(Tier),
}

/// Result of one request through the stack.
#[derive(Debug)]
pub struct Dispatched {
    pub ctx: RequestContext,
    pub outcome: DispatchOutcome,
    /// One report per tier that ran, in pipeline order.
    pub reports: Vec<TierReport>,
}

/// Runs Macro, Mezzo and Micro in that order. Construct once at startup, then
/// share via Arc.
pub struct UnifiedDispatcher {
    env: Arc<PipelineEnv>,
    macro_tier: TierPipeline,
    mezzo: TierPipeline,
    micro: TierPipeline,
}

impl UnifiedDispatcher {
    pub fn new(
        cfg: &GatewayConfig,
        registries: Arc<Registries>,
        gates: PolicyGates,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        let env = Arc::new(PipelineEnv::new(cfg, registries, gates, metrics));
        let sequencer = AuditSequencer::new();

        let pipeline = |tier: Tier, stages, capacity| {
            TierPipeline::new(
                tier,
                stages,
                Arc::clone(&env),
                Arc::new(AuditTrail::new(tier, capacity)),
                sequencer.clone(),
            )
        };

        Self {
            macro_tier: pipeline(Tier::Macro, macro_tier::stages(), cfg.audit.macro_capacity),
            mezzo: pipeline(Tier::Mezzo, mezzo_tier::stages(), cfg.audit.mezzo_capacity),
            micro: pipeline(Tier::Micro, micro_tier::stages(), cfg.audit.micro_capacity),
            env,
        }
    }

    /// Registries populated from `cfg`, default gates, fresh metrics.
    pub fn from_config(cfg: &GatewayConfig) -> Self {
        Self::new(
            cfg,
            Arc::new(Registries::from_config(cfg)),
            PolicyGates::from_config(cfg),
            Arc::new(PipelineMetrics::default()),
        )
    }

    /// Administrative access: add/remove nodes, record health checks.
    pub fn registries(&self) -> &Arc<Registries> {
        &self.env.registries
    }

    pub fn metrics(&self) -> &Arc<PipelineMetrics> {
        &self.env.metrics
    }

    pub fn env(&self) -> &PipelineEnv {
        &self.env
    }

    pub fn pipeline(&self, tier: Tier) -> &TierPipeline {
        match tier {
            Tier::Macro => &self.macro_tier,
            Tier::Mezzo => &self.mezzo,
            Tier::Micro => &self.micro,
        }
    }

    pub fn audit(&self, tier: Tier) -> &Arc<AuditTrail> {
        self.pipeline(tier).trail()
    }

    pub async fn dispatch(&self, mut ctx: RequestContext) -> Dispatched {
        let mut reports = Vec::with_capacity(Tier::PIPELINE_ORDER.len());

        let run = AssertUnwindSafe(self.run_tiers(&mut ctx, &mut reports))
            .catch_unwind()
            .await;

        let outcome = match run {
            Ok(outcome) => outcome,
            Err(_) => {
                // the tier that was running has not reported yet
                let tier = Tier::PIPELINE_ORDER
                    .get(reports.len())
                    .copied()
                    .unwrap_or(Tier::Micro);
                tracing::error!(
                    tier = tier.as_str(),
                    correlation_id = %ctx.correlation_id,
                    "panic caught at dispatcher boundary"
                );
                self.env.metrics.internal_errors.inc(&[("tier", tier.as_str())]);

                let rejection = Rejection::internal(tier, "panic in pipeline");
                self.pipeline(tier).record_rejection(&ctx, &rejection);
                DispatchOutcome::Rejected(rejection)
            }
        };

        if let DispatchOutcome::Passed = outcome {
            tracing::debug!(
                correlation_id = %ctx.correlation_id,
                from = %ctx.path,
                to = %ctx.routed_path(),
                "request passed all tiers"
            );
        }

        Dispatched {
            ctx,
            outcome,
            reports,
        }
    }

    async fn run_tiers(&self, ctx: &mut RequestContext, reports: &mut Vec<TierReport>) -> DispatchOutcome {
        for tier in Tier::PIPELINE_ORDER {
            let report = self.pipeline(tier).run(ctx).await;
            let outcome = report.outcome.clone();
            reports.push(report);

            match outcome {
                TierOutcome::Passed => {}
                TierOutcome::Rejected(rejection) => return DispatchOutcome::Rejected(rejection),
                TierOutcome::Cancelled => return DispatchOutcome::Cancelled(tier),
            }
        }
        DispatchOutcome::Passed
    }

    /// Read-only view of node counts, rule counts, audit sizes and health.
    pub fn status(&self) -> StatusReport {
        status::collect(self)
    }
}
