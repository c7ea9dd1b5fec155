#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use longcut_core::{RejectKind, RuleTable, Tier, TransformationRule, RuleScope};
use longcut_gateway::audit::AuditOutcome;
use longcut_gateway::config::{self, GatewayConfig};
use longcut_gateway::context::{headers, RequestContext};
use longcut_gateway::dispatch::{DispatchOutcome, Dispatched, UnifiedDispatcher};
use longcut_gateway::obs::PipelineMetrics;
use longcut_gateway::pipeline::{PipelineState, Rejection};
use longcut_gateway::policy::{
    AccessClaims, GateContext, GateOutcome, JwtAuthenticator, PolicyGate, PolicyGates,
};
use longcut_gateway::registry::Registries;
use longcut_gateway::resolve::MACRO_EMBED_PREFIX;

fn builtin() -> GatewayConfig {
    config::load_builtin().unwrap()
}

const SECRET: &[u8] = b"pipeline-flow-secret-pipeline-flow";

fn jwt() -> JwtAuthenticator {
    JwtAuthenticator::new(SECRET, Duration::from_secs(3600), "0x21cC30462B8392Aa250453704019800092a16165")
}

fn bearer(subject: &str) -> String {
    format!("Bearer {}", jwt().issue(subject, vec!["read".into()]).unwrap())
}

/// Authentication always verifies against [`SECRET`].
fn dispatcher(cfg: &GatewayConfig, gates: PolicyGates) -> UnifiedDispatcher {
    UnifiedDispatcher::new(
        cfg,
        Arc::new(Registries::from_config(cfg)),
        gates.with_authentication(Arc::new(jwt())),
        Arc::new(PipelineMetrics::default()),
    )
}

fn default_dispatcher() -> UnifiedDispatcher {
    let cfg = builtin();
    dispatcher(&cfg, PolicyGates::default())
}

fn authed(method: &str, path: &str) -> RequestContext {
    RequestContext::new(method, path)
        .with_header("authorization", &bearer("tester"))
        .with_client("10.0.0.1")
}

fn rejection(d: &Dispatched) -> &Rejection {
    match &d.outcome {
        DispatchOutcome::Rejected(r) => r,
        other => panic!("expected rejection, got {other:?}"),
    }
}

struct Deny(&'static str);

#[async_trait]
impl PolicyGate for Deny {
    fn name(&self) -> &'static str {
        self.0
    }
    async fn validate(&self, _ctx: &GateContext) -> GateOutcome {
        GateOutcome::deny("not today")
            .with_violations(vec!["DATA_RESIDENCY".into()], vec!["REVIEW".into()])
    }
}

struct Slow(Duration);

#[async_trait]
impl PolicyGate for Slow {
    fn name(&self) -> &'static str {
        "slow"
    }
    async fn validate(&self, _ctx: &GateContext) -> GateOutcome {
        tokio::time::sleep(self.0).await;
        GateOutcome::accept("eventually")
    }
}

struct Explodes;

#[async_trait]
impl PolicyGate for Explodes {
    fn name(&self) -> &'static str {
        "explodes"
    }
    async fn validate(&self, _ctx: &GateContext) -> GateOutcome {
        panic!("gate bug")
    }
}

#[tokio::test]
async fn request_passes_all_tiers_in_order() {
    let d = default_dispatcher();
    let out = d.dispatch(authed("GET", "/api/users")).await;

    assert!(matches!(out.outcome, DispatchOutcome::Passed), "{:?}", out.outcome);
    let tiers: Vec<Tier> = out.reports.iter().map(|r| r.tier).collect();
    assert_eq!(tiers, vec![Tier::Macro, Tier::Mezzo, Tier::Micro]);
    for report in &out.reports {
        assert_eq!(
            report.trace,
            vec![
                PipelineState::Entered,
                PipelineState::Identified,
                PipelineState::Validated,
                PipelineState::Transformed,
                PipelineState::Audited,
                PipelineState::Passed,
            ]
        );
    }

    let ctx = &out.ctx;
    assert_eq!(ctx.macro_tier.ecosystem.as_deref(), Some("offstar-ecosystem"));
    assert_eq!(ctx.mezzo.service.as_deref(), Some("offstar-multi-bridge"));
    assert_eq!(ctx.routed_path(), "/secure/authenticated/api/v1/validated/users");
    assert_eq!(ctx.response_headers.get(headers::TRANSFORMATION).unwrap(), "SHORTCUT_TO_LONGCUT");
    assert_eq!(ctx.response_headers.get(headers::SECURITY_LEVEL).unwrap(), "MICRO");
    assert_eq!(
        ctx.response_headers.get(headers::CORRELATION_ID).unwrap(),
        &ctx.correlation_id.to_string()
    );

    // one entry per tier, stamped in pipeline order
    let seq = |tier| {
        let entries = d.audit(tier).entries_for(ctx.correlation_id);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].outcome, AuditOutcome::Accepted);
        entries[0].seq
    };
    let (macro_seq, mezzo_seq, micro_seq) = (seq(Tier::Macro), seq(Tier::Mezzo), seq(Tier::Micro));
    assert!(macro_seq < mezzo_seq && mezzo_seq < micro_seq);
}

#[tokio::test]
async fn ecosystem_identification() {
    let d = default_dispatcher();
    let eco = |out: Dispatched| out.ctx.macro_tier.ecosystem.clone().unwrap();

    let by_header = d
        .dispatch(authed("GET", "/blockchain/tx").with_header(headers::SERVICE_ECOSYSTEM, "ob1-control-system"))
        .await;
    assert_eq!(eco(by_header), "ob1-control-system");

    let by_keyword = d.dispatch(authed("GET", "/blockchain/tx")).await;
    assert_eq!(eco(by_keyword), "blockchain-infrastructure");

    let unknown_header = d
        .dispatch(authed("GET", "/OB1/status").with_header(headers::SERVICE_ECOSYSTEM, "nope"))
        .await;
    assert_eq!(eco(unknown_header), "ob1-control-system");

    let fallback = d.dispatch(authed("GET", "/api/x")).await;
    assert_eq!(eco(fallback), "offstar-ecosystem");
}

#[tokio::test]
async fn service_graph_hit_is_embedded_and_ledger_validated() {
    let d = default_dispatcher();
    let out = d.dispatch(authed("GET", "/quick-bridge/x")).await;
    assert!(matches!(out.outcome, DispatchOutcome::Passed), "{:?}", out.outcome);

    let ctx = &out.ctx;
    let macro_hit = ctx.macro_tier.transformation.as_ref().unwrap();
    assert_eq!(macro_hit.owner, "offstar-multi-bridge");
    assert_eq!(
        macro_hit.longcut,
        format!("{MACRO_EMBED_PREFIX}/secure/orchestrated/bridge/multi-service/validation/x")
    );
    assert_eq!(ctx.response_headers.get(headers::BLOCKCHAIN_INTEGRATION).unwrap(), "ENABLED");
    assert_eq!(ctx.macro_tier.ledger_reference.as_ref().unwrap().len(), 64);

    let mezzo_hit = ctx.mezzo.transformation.as_ref().unwrap();
    assert_eq!(mezzo_hit.depth, 1);
    assert_eq!(ctx.response_headers.get(headers::SERVICE_GRAPH).unwrap(), "offstar-multi-bridge");
    assert_eq!(ctx.response_headers.get(headers::TRANSFORMATION_DEPTH).unwrap(), "1");
    // cross-service gate consulted once per dependency of the owner
    assert_eq!(
        ctx.mezzo.validators.iter().filter(|v| v.gate == "cross_service").count(),
        2
    );
    assert!(ctx.micro.transformation.is_none());
    assert_eq!(ctx.routed_path(), "/secure/orchestrated/bridge/multi-service/validation/x");
}

#[tokio::test]
async fn tier_headers_describe_each_rewrite() {
    let d = default_dispatcher();
    let header = |out: &Dispatched, name: &str| out.ctx.response_headers.get(name).cloned();

    let graph = d.dispatch(authed("GET", "/quick-bridge/x")).await;
    assert_eq!(header(&graph, headers::ORCHESTRATION).as_deref(), Some("DISTRIBUTED"));
    assert_eq!(header(&graph, headers::GOVERNANCE).as_deref(), Some("ENTERPRISE"));
    assert_eq!(
        header(&graph, headers::WALLET_CONTEXT).as_deref(),
        Some("0x21cC30462B8392Aa250453704019800092a16165")
    );
    let minted = header(&graph, headers::ORCHESTRATION_ID).unwrap();
    assert!(uuid::Uuid::parse_str(&minted).is_ok(), "{minted}");
    assert_eq!(graph.ctx.mezzo.orchestration_id.as_deref(), Some(minted.as_str()));

    let echoed = d
        .dispatch(authed("GET", "/quick-bridge/x").with_header(headers::ORCHESTRATION_ID, "run-42"))
        .await;
    assert_eq!(header(&echoed, headers::ORCHESTRATION_ID).as_deref(), Some("run-42"));

    let endpoint = d.dispatch(authed("GET", "/api/users")).await;
    assert_eq!(header(&endpoint, headers::WALLET_CONTEXT).as_deref(), Some("0x21cC3046..."));
    assert!(header(&endpoint, headers::ORCHESTRATION).is_none());
    assert!(header(&endpoint, headers::GOVERNANCE).is_none());
    assert!(header(&endpoint, headers::ORCHESTRATION_ID).is_some());
}

#[tokio::test]
async fn ecosystem_rule_keeps_its_own_longcut() {
    let d = default_dispatcher();
    let out = d.dispatch(authed("GET", "/enterprise/reports")).await;
    let hit = out.ctx.macro_tier.transformation.as_ref().unwrap();
    assert_eq!(hit.owner, "offstar-ecosystem");
    assert_eq!(hit.longcut, "/secure/enterprise/global/governance/validated/access/reports");
}

#[tokio::test]
async fn stale_dependency_is_unavailable() {
    let d = default_dispatcher();
    d.registries()
        .record_health_check(
            "blockchain-ai-infrastructure",
            Utc::now() - chrono::Duration::seconds(120),
        )
        .unwrap();

    let out = d.dispatch(authed("GET", "/api/x")).await;
    let r = rejection(&out);
    assert_eq!(r.kind, RejectKind::DependencyUnavailable);
    assert_eq!(r.tier, Tier::Mezzo);
    assert_eq!(r.status, 503);
    assert_eq!(r.detail("failedDependencies").unwrap(), &json!(["blockchain-ai-infrastructure"]));

    let body = r.body(out.ctx.correlation_id);
    assert_eq!(body["securityLevel"], "MEZZO_DEPENDENCY_FAILED");

    let cid = out.ctx.correlation_id;
    assert_eq!(d.audit(Tier::Macro).entries_for(cid).len(), 1);
    assert!(matches!(
        d.audit(Tier::Mezzo).entries_for(cid)[0].outcome,
        AuditOutcome::Rejected { .. }
    ));
    assert!(d.audit(Tier::Micro).entries_for(cid).is_empty());

    // the next health check clears it
    d.registries()
        .record_health_check("blockchain-ai-infrastructure", Utc::now())
        .unwrap();
    let out = d.dispatch(authed("GET", "/api/x")).await;
    assert!(matches!(out.outcome, DispatchOutcome::Passed));
}

#[tokio::test]
async fn unregistered_dependency_and_unknown_service() {
    let d = default_dispatcher();
    d.registries()
        .add_service_node("lonely", vec!["ghost".into()], RuleTable::new());

    let out = d
        .dispatch(authed("GET", "/api/x").with_header(headers::SERVICE_NAME, "lonely"))
        .await;
    let r = rejection(&out);
    assert_eq!(r.kind, RejectKind::DependencyUnavailable);
    assert_eq!(r.detail("failedDependencies").unwrap(), &json!(["ghost"]));

    let out = d
        .dispatch(authed("GET", "/api/x").with_header(headers::SERVICE_NAME, "nobody"))
        .await;
    let r = rejection(&out);
    assert_eq!(r.kind, RejectKind::ServiceNotFound);
    assert_eq!(r.status, 404);
    assert_eq!(r.security_level(), "MEZZO_BLOCKED");
}

#[tokio::test]
async fn administrative_changes_apply_to_next_request() {
    let d = default_dispatcher();
    let rules: RuleTable = [TransformationRule::new("/fresh", "/secure/fresh", RuleScope::Service)]
        .into_iter()
        .collect();
    d.registries().add_service_node("fresh-svc", vec![], rules);

    let out = d
        .dispatch(authed("GET", "/fresh/1").with_header(headers::SERVICE_NAME, "fresh-svc"))
        .await;
    assert!(matches!(out.outcome, DispatchOutcome::Passed));
    assert_eq!(out.ctx.mezzo.transformation.as_ref().unwrap().longcut, "/secure/fresh/1");

    d.registries().remove_service_node("fresh-svc").unwrap();
    assert!(d.registries().remove_service_node("fresh-svc").is_err());

    let out = d
        .dispatch(authed("GET", "/fresh/1").with_header(headers::SERVICE_NAME, "fresh-svc"))
        .await;
    assert_eq!(rejection(&out).kind, RejectKind::ServiceNotFound);
}

#[tokio::test]
async fn macro_rejection_short_circuits() {
    let cfg = builtin();
    let d = dispatcher(&cfg, PolicyGates::default().with_governance(Arc::new(Deny("governance"))));

    let out = d.dispatch(authed("GET", "/api/x")).await;
    let r = rejection(&out);
    assert_eq!(r.kind, RejectKind::GovernanceDenied);
    assert_eq!(r.status, 403);
    assert_eq!(
        r.detail("escalationPath").unwrap(),
        "SECURITY_TEAM -> GOVERNANCE_BOARD -> BLOCKCHAIN_VALIDATORS"
    );
    assert_eq!(out.reports.len(), 1);
    assert_eq!(
        out.reports[0].final_state(),
        PipelineState::Rejected(RejectKind::GovernanceDenied)
    );

    let cid = out.ctx.correlation_id;
    assert_eq!(d.audit(Tier::Macro).entries_for(cid).len(), 1);
    assert!(d.audit(Tier::Mezzo).entries_for(cid).is_empty());
    assert!(d.audit(Tier::Micro).entries_for(cid).is_empty());
    assert_eq!(d.status().tier(Tier::Macro).unwrap().counters.rejected, 1);
}

#[tokio::test]
async fn compliance_denial_carries_violations() {
    let cfg = builtin();
    let d = dispatcher(&cfg, PolicyGates::default().with_compliance(Arc::new(Deny("compliance"))));

    let out = d.dispatch(authed("GET", "/api/x")).await;
    let body = rejection(&out).body(out.ctx.correlation_id);
    assert_eq!(body["kind"], "ComplianceViolation");
    assert_eq!(body["securityLevel"], "MACRO_COMPLIANCE_BLOCKED");
    assert_eq!(body["complianceViolations"], json!(["DATA_RESIDENCY"]));
    assert_eq!(body["requiredActions"], json!(["REVIEW"]));
}

#[tokio::test]
async fn blockchain_gate_only_runs_for_flagged_rules() {
    let cfg = builtin();
    let d = dispatcher(&cfg, PolicyGates::default().with_blockchain(Arc::new(Deny("blockchain"))));

    // no macro transformation, gate skipped
    let out = d.dispatch(authed("GET", "/api/x")).await;
    assert!(matches!(out.outcome, DispatchOutcome::Passed));

    let out = d.dispatch(authed("GET", "/enterprise")).await;
    let r = rejection(&out);
    assert_eq!(r.kind, RejectKind::BlockchainValidationFailed);
    assert_eq!(r.security_level(), "MACRO_BLOCKCHAIN_BLOCKED");
}

#[tokio::test]
async fn cross_service_denial_lists_failed_services() {
    let cfg = builtin();
    let d = dispatcher(&cfg, PolicyGates::default().with_cross_service(Arc::new(Deny("cross_service"))));

    // no mezzo match, gate skipped
    let out = d.dispatch(authed("GET", "/api/x")).await;
    assert!(matches!(out.outcome, DispatchOutcome::Passed));

    let out = d.dispatch(authed("GET", "/fast-connect")).await;
    let r = rejection(&out);
    assert_eq!(r.kind, RejectKind::CrossServiceValidationFailed);
    assert_eq!(
        r.detail("failedServices").unwrap(),
        &json!([
            {"service": "ob1-control-plane", "reason": "not today"},
            {"service": "blockchain-ai-infrastructure", "reason": "not today"},
        ])
    );
}

#[tokio::test]
async fn gate_timeout_is_dependency_unavailable() {
    let mut cfg = builtin();
    cfg.gateway.gate_timeout_ms = 100;
    let d = dispatcher(&cfg, PolicyGates::default().with_governance(Arc::new(Slow(Duration::from_secs(10)))));

    let out = d.dispatch(authed("GET", "/api/x")).await;
    let r = rejection(&out);
    assert_eq!(r.kind, RejectKind::DependencyUnavailable);
    assert_eq!(r.tier, Tier::Macro);
    assert_eq!(r.status, 503);
    assert_eq!(d.metrics().gate_failures.get(&[("gate", "slow"), ("cause", "timeout")]), 1);
}

#[tokio::test]
async fn gate_panic_is_internal_error() {
    let cfg = builtin();
    let d = dispatcher(&cfg, PolicyGates::default().with_compliance(Arc::new(Explodes)));

    let out = d.dispatch(authed("GET", "/api/x")).await;
    let r = rejection(&out);
    assert_eq!(r.kind, RejectKind::InternalPipelineError);
    assert_eq!(r.status, 500);

    let body = r.body(out.ctx.correlation_id);
    assert_eq!(body["securityLevel"], "SYSTEM_ERROR");
    assert_eq!(body["error"], "Security system error");
    assert_eq!(d.metrics().internal_errors.get(&[("tier", "MACRO")]), 1);
    assert_eq!(d.metrics().gate_failures.get(&[("gate", "explodes"), ("cause", "panic")]), 1);

    // a second request is still handled
    let again = d.dispatch(authed("GET", "/api/y")).await;
    assert_eq!(rejection(&again).kind, RejectKind::InternalPipelineError);
    assert_eq!(d.metrics().internal_errors.get(&[("tier", "MACRO")]), 2);
}

#[tokio::test]
async fn cancellation_mid_gate_is_audited() {
    let cfg = builtin();
    let d = dispatcher(&cfg, PolicyGates::default().with_governance(Arc::new(Slow(Duration::from_secs(2)))));

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let out = d.dispatch(authed("GET", "/api/x").with_cancel(cancel)).await;
    assert!(matches!(out.outcome, DispatchOutcome::Cancelled(Tier::Macro)));
    assert_eq!(out.reports[0].final_state(), PipelineState::Cancelled);

    let entries = d.audit(Tier::Macro).entries_for(out.ctx.correlation_id);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].outcome, AuditOutcome::Cancelled);
    assert!(d.audit(Tier::Mezzo).entries_for(out.ctx.correlation_id).is_empty());
}

#[tokio::test]
async fn already_cancelled_request_stops_before_first_stage() {
    let d = default_dispatcher();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let out = d.dispatch(authed("GET", "/api/x").with_cancel(cancel)).await;
    assert!(matches!(out.outcome, DispatchOutcome::Cancelled(Tier::Macro)));
    assert!(out.ctx.macro_tier.ecosystem.is_none());
    assert_eq!(d.status().tier(Tier::Macro).unwrap().counters.cancelled, 1);
}

#[tokio::test]
async fn authentication_statuses() {
    let d = default_dispatcher();
    let with_token = |token: &str| {
        RequestContext::new("GET", "/api/x").with_header("authorization", &format!("Bearer {token}"))
    };

    let missing = d.dispatch(RequestContext::new("GET", "/api/x")).await;
    let r = rejection(&missing);
    assert_eq!((r.kind, r.status), (RejectKind::AuthenticationFailure, 401));
    assert_eq!(r.security_level(), "MICRO_BLOCKED");

    let garbage = d.dispatch(with_token("bad")).await;
    let r = rejection(&garbage);
    assert_eq!((r.kind, r.status), (RejectKind::AuthenticationFailure, 403));
    assert_eq!(r.security_level(), "MICRO_REJECTED");

    let foreign = JwtAuthenticator::new(b"some-other-secret-some-other-secret", Duration::from_secs(60), "w")
        .issue("mallory", vec![])
        .unwrap();
    let r = d.dispatch(with_token(&foreign)).await;
    assert_eq!(rejection(&r).status, 403);

    let now = Utc::now().timestamp();
    let expired = jwt()
        .sign(&AccessClaims {
            sub: "ada".into(),
            permissions: vec![],
            wallet: String::new(),
            security_level: "MICRO".into(),
            iat: now - 7200,
            exp: now - 60,
        })
        .unwrap();
    let r = d.dispatch(with_token(&expired)).await;
    let r = rejection(&r);
    assert_eq!((r.kind, r.status), (RejectKind::AuthenticationFailure, 403));
    assert_eq!(r.message(), "Access denied: Invalid token");
    assert_eq!(r.reason, "token expired");

    let ok = d.dispatch(RequestContext::new("GET", "/api/x").with_header("authorization", &bearer("ada"))).await;
    assert!(matches!(ok.outcome, DispatchOutcome::Passed));
    assert_eq!(ok.ctx.micro.principal.as_deref(), Some("ada"));
}

#[tokio::test]
async fn micro_input_limits() {
    let mut cfg = builtin();
    cfg.micro.rate_limit.max_requests = 2;
    cfg.micro.required_headers = vec!["user-agent".into()];
    let d = dispatcher(&cfg, PolicyGates::default());
    let req = |method: &str, client: &str| {
        authed(method, "/api/x")
            .with_client(client)
            .with_header("user-agent", "tests")
    };

    let r = d.dispatch(req("PATCH", "a")).await;
    assert_eq!(rejection(&r).kind, RejectKind::MethodNotAllowed);
    assert_eq!(rejection(&r).status, 405);

    let big = d
        .dispatch(req("POST", "b").with_header("content-length", (2 * 1024 * 1024).to_string()))
        .await;
    assert_eq!(rejection(&big).kind, RejectKind::OversizedRequest);
    assert_eq!(rejection(&big).status, 413);

    let no_ua = d.dispatch(authed("GET", "/api/x").with_client("c")).await;
    assert_eq!(rejection(&no_ua).kind, RejectKind::MissingRequiredHeader);
    assert_eq!(rejection(&no_ua).status, 400);

    assert!(matches!(d.dispatch(req("GET", "d")).await.outcome, DispatchOutcome::Passed));
    assert!(matches!(d.dispatch(req("GET", "d")).await.outcome, DispatchOutcome::Passed));
    let limited = d.dispatch(req("GET", "d")).await;
    assert_eq!(rejection(&limited).kind, RejectKind::RateLimitExceeded);
    assert_eq!(rejection(&limited).status, 429);
}

#[tokio::test]
async fn body_is_sanitized_before_handoff() {
    let d = default_dispatcher();
    let out = d
        .dispatch(authed("POST", "/data").with_body(json!({
            "__proto__": {"polluted": true},
            "note": "<script>alert(1)</script> hello <b>world</b> ",
        })))
        .await;
    assert!(matches!(out.outcome, DispatchOutcome::Passed));
    assert_eq!(out.ctx.body, Some(json!({"note": "hello world"})));
}

#[tokio::test]
async fn status_reports_counts_and_health() {
    let d = default_dispatcher();
    d.dispatch(authed("GET", "/api/x")).await;

    let status = d.status();
    let macro_status = status.tier(Tier::Macro).unwrap();
    assert_eq!(macro_status.nodes, 4);
    assert_eq!(macro_status.audit.capacity, 10000);
    assert_eq!(macro_status.audit.len, 1);
    assert_eq!(macro_status.counters.passed, 1);

    let mezzo_status = status.tier(Tier::Mezzo).unwrap();
    assert_eq!(mezzo_status.nodes, 5);
    assert_eq!(mezzo_status.rules, 7);

    let micro_status = status.tier(Tier::Micro).unwrap();
    assert_eq!(micro_status.rules, 8);
    assert_eq!(micro_status.audit.capacity, 1000);

    assert_eq!(status.health.services, 5);
    assert_eq!(status.health.healthy, 5);
    assert!(status.health.stale.is_empty());
}
