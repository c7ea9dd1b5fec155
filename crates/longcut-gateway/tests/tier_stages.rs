#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use longcut_core::{RejectKind, Tier};
use longcut_gateway::audit::{AuditOutcome, AuditSequencer, AuditTrail};
use longcut_gateway::config;
use longcut_gateway::context::RequestContext;
use longcut_gateway::obs::PipelineMetrics;
use longcut_gateway::pipeline::{
    PipelineEnv, PipelineState, Rejection, Stage, StageResult, TierOutcome, TierPipeline,
};
use longcut_gateway::policy::PolicyGates;
use longcut_gateway::registry::Registries;

struct Step {
    name: &'static str,
    reaches: Option<PipelineState>,
    result: fn() -> StageResult,
    calls: Arc<AtomicUsize>,
}

impl Step {
    fn new(name: &'static str, reaches: Option<PipelineState>, result: fn() -> StageResult) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                name,
                reaches,
                result,
                calls: Arc::clone(&calls),
            },
            calls,
        )
    }
}

#[async_trait]
impl Stage for Step {
    fn name(&self) -> &'static str {
        self.name
    }

    fn reaches(&self) -> Option<PipelineState> {
        self.reaches
    }

    async fn run(&self, _env: &PipelineEnv, _ctx: &mut RequestContext) -> StageResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.result)()
    }
}

fn pipeline(stages: Vec<Box<dyn Stage>>) -> TierPipeline {
    let cfg = config::load_builtin().unwrap();
    let env = PipelineEnv::new(
        &cfg,
        Arc::new(Registries::from_config(&cfg)),
        PolicyGates::default(),
        Arc::new(PipelineMetrics::default()),
    );
    TierPipeline::new(
        Tier::Mezzo,
        stages,
        Arc::new(env),
        Arc::new(AuditTrail::new(Tier::Mezzo, 16)),
        AuditSequencer::new(),
    )
}

fn refuse() -> StageResult {
    StageResult::Reject(Rejection::new(Tier::Mezzo, RejectKind::ServiceNotFound, "gone"))
}

#[tokio::test]
async fn rejection_stops_later_stages() {
    let (identify, _) = Step::new("identify", Some(PipelineState::Identified), || StageResult::Continue);
    let (check, _) = Step::new("check", Some(PipelineState::Validated), refuse);
    let (never, never_calls) = Step::new("never", Some(PipelineState::Transformed), || StageResult::Continue);
    let p = pipeline(vec![Box::new(identify), Box::new(check), Box::new(never)]);

    let mut ctx = RequestContext::new("GET", "/x");
    let report = p.run(&mut ctx).await;

    assert!(matches!(report.outcome, TierOutcome::Rejected(_)));
    assert_eq!(
        report.trace,
        vec![
            PipelineState::Entered,
            PipelineState::Identified,
            PipelineState::Rejected(RejectKind::ServiceNotFound),
        ]
    );
    assert_eq!(never_calls.load(Ordering::SeqCst), 0);

    let entries = p.trail().entries_for(ctx.correlation_id);
    assert_eq!(entries.len(), 1);
    assert!(matches!(entries[0].outcome, AuditOutcome::Rejected { .. }));
    assert_eq!(p.counters().rejected, 1);
}

#[tokio::test]
async fn stages_without_a_state_leave_trace_alone() {
    let (a, _) = Step::new("a", Some(PipelineState::Identified), || StageResult::Continue);
    let (quiet, quiet_calls) = Step::new("quiet", None, || StageResult::Continue);
    let (b, _) = Step::new("b", Some(PipelineState::Transformed), || StageResult::Continue);
    let p = pipeline(vec![Box::new(a), Box::new(quiet), Box::new(b)]);
    assert_eq!(p.stage_names(), vec!["a", "quiet", "b"]);

    let mut ctx = RequestContext::new("GET", "/x");
    let report = p.run(&mut ctx).await;

    assert_eq!(quiet_calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        report.trace,
        vec![
            PipelineState::Entered,
            PipelineState::Identified,
            PipelineState::Transformed,
            PipelineState::Audited,
            PipelineState::Passed,
        ]
    );
    assert!(report.trace.windows(2).all(|w| w[0].can_advance_to(w[1])));
    assert_eq!(ctx.response_headers.get("x-security-level").unwrap(), "MEZZO");
}

#[tokio::test]
async fn stage_cancellation_is_terminal() {
    let (a, _) = Step::new("a", Some(PipelineState::Identified), || StageResult::Cancelled);
    let (b, b_calls) = Step::new("b", None, || StageResult::Continue);
    let p = pipeline(vec![Box::new(a), Box::new(b)]);

    let mut ctx = RequestContext::new("GET", "/x");
    let report = p.run(&mut ctx).await;

    assert!(matches!(report.outcome, TierOutcome::Cancelled));
    assert_eq!(report.final_state(), PipelineState::Cancelled);
    assert!(report.final_state().is_terminal());
    assert_eq!(b_calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        p.trail().entries_for(ctx.correlation_id)[0].outcome,
        AuditOutcome::Cancelled
    );
}
