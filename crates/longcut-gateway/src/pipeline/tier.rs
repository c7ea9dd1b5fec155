//! One tier's stage list and the loop that interprets it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

use longcut_core::{RejectKind, Tier};

use crate::audit::{AuditOutcome, AuditSequencer, AuditTrail};
use crate::context::RequestContext;

use super::env::PipelineEnv;
use super::rejection::Rejection;
use super::stage::{Stage, StageResult};
use super::state::PipelineState;

#[derive(Debug, Clone)]
pub enum TierOutcome {
    Passed,
    Rejected(Rejection),
    Cancelled,
}

/// What one tier did with one request.
#[derive(Debug, Clone)]
pub struct TierReport {
    pub tier: Tier,
    pub outcome: TierOutcome,
    /// Every state the tier moved through, starting at `Entered`.
    pub trace: Vec<PipelineState>,
}

impl TierReport {
    pub fn final_state(&self) -> PipelineState {
        self.trace.last().copied().unwrap_or(PipelineState::Entered)
    }
}

#[derive(Debug, Default)]
pub struct TierCounters {
    passed: AtomicU64,
    rejected: AtomicU64,
    cancelled: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub passed: u64,
    pub rejected: u64,
    pub cancelled: u64,
}

impl TierCounters {
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            passed: self.passed.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
        }
    }
}

pub struct TierPipeline {
    tier: Tier,
    stages: Vec<Box<dyn Stage>>,
    env: Arc<PipelineEnv>,
    trail: Arc<AuditTrail>,
    sequencer: AuditSequencer,
    counters: TierCounters,
}

impl TierPipeline {
    pub fn new(
        tier: Tier,
        stages: Vec<Box<dyn Stage>>,
        env: Arc<PipelineEnv>,
        trail: Arc<AuditTrail>,
        sequencer: AuditSequencer,
    ) -> Self {
        Self {
            tier,
            stages,
            env,
            trail,
            sequencer,
            counters: TierCounters::default(),
        }
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn trail(&self) -> &Arc<AuditTrail> {
        &self.trail
    }

    pub fn counters(&self) -> CounterSnapshot {
        self.counters.snapshot()
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub async fn run(&self, ctx: &mut RequestContext) -> TierReport {
        let mut trace = vec![PipelineState::Entered];

        for stage in &self.stages {
            if ctx.cancel.is_cancelled() {
                return self.cancelled(ctx, trace, stage.name());
            }

            match stage.run(&self.env, ctx).await {
                StageResult::Continue => {
                    if let Some(next) = stage.reaches() {
                        advance(&mut trace, next);
                    }
                }
                StageResult::Reject(rejection) => return self.rejected(ctx, trace, stage.name(), rejection),
                StageResult::Cancelled => return self.cancelled(ctx, trace, stage.name()),
            }
        }

        self.append(ctx, AuditOutcome::Accepted);
        advance(&mut trace, PipelineState::Audited);
        advance(&mut trace, PipelineState::Passed);

        self.counters.passed.fetch_add(1, Ordering::Relaxed);
        self.env
            .metrics
            .tier_outcomes
            .inc(&[("tier", self.tier.as_str()), ("outcome", "passed")]);
        ctx.set_response_header(crate::context::headers::SECURITY_LEVEL, self.tier.as_str());

        TierReport {
            tier: self.tier,
            outcome: TierOutcome::Passed,
            trace,
        }
    }

    /// Record a rejection raised outside the stage loop (a caught panic).
    pub fn record_rejection(&self, ctx: &RequestContext, rejection: &Rejection) {
        self.append(ctx, AuditOutcome::rejected(rejection.kind, &rejection.reason));
        self.counters.rejected.fetch_add(1, Ordering::Relaxed);
        self.count_rejection(rejection);
    }

    fn rejected(
        &self,
        ctx: &mut RequestContext,
        mut trace: Vec<PipelineState>,
        stage: &'static str,
        rejection: Rejection,
    ) -> TierReport {
        if rejection.kind == RejectKind::InternalPipelineError {
            tracing::error!(
                tier = self.tier.as_str(),
                stage,
                correlation_id = %ctx.correlation_id,
                reason = %rejection.reason,
                "internal pipeline error"
            );
            self.env.metrics.internal_errors.inc(&[("tier", self.tier.as_str())]);
        } else {
            tracing::warn!(
                tier = self.tier.as_str(),
                stage,
                correlation_id = %ctx.correlation_id,
                kind = rejection.kind.as_str(),
                status = rejection.status,
                reason = %rejection.reason,
                "request rejected"
            );
        }
        self.record_rejection(ctx, &rejection);
        advance(&mut trace, PipelineState::Rejected(rejection.kind));

        TierReport {
            tier: self.tier,
            outcome: TierOutcome::Rejected(rejection),
            trace,
        }
    }

    fn cancelled(
        &self,
        ctx: &mut RequestContext,
        mut trace: Vec<PipelineState>,
        stage: &'static str,
    ) -> TierReport {
        tracing::info!(tier = self.tier.as_str(), stage, correlation_id = %ctx.correlation_id, "request cancelled");
        self.append(ctx, AuditOutcome::Cancelled);
        advance(&mut trace, PipelineState::Cancelled);

        self.counters.cancelled.fetch_add(1, Ordering::Relaxed);
        self.env
            .metrics
            .tier_outcomes
            .inc(&[("tier", self.tier.as_str()), ("outcome", "cancelled")]);

        TierReport {
            tier: self.tier,
            outcome: TierOutcome::Cancelled,
            trace,
        }
    }

    fn count_rejection(&self, rejection: &Rejection) {
        let tier = self.tier.as_str();
        self.env
            .metrics
            .tier_outcomes
            .inc(&[("tier", tier), ("outcome", "rejected")]);
        self.env
            .metrics
            .rejections
            .inc(&[("tier", tier), ("kind", rejection.kind.as_str())]);
    }

    fn append(&self, ctx: &RequestContext, outcome: AuditOutcome) {
        let entry = self.sequencer.stamp(
            self.tier,
            ctx.correlation_id,
            outcome,
            ctx.audit_snapshot(self.tier),
        );
        self.trail.append(entry);
    }
}

fn advance(trace: &mut Vec<PipelineState>, next: PipelineState) {
    let current = trace.last().copied().unwrap_or(PipelineState::Entered);
    if current.can_advance_to(next) {
        trace.push(next);
    }
}
