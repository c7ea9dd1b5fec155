//! Endpoint-level stages.

use async_trait::async_trait;

use longcut_core::{RejectKind, Tier};

use crate::context::{headers, RequestContext};
use crate::policy::sanitize::sanitize_value;
use crate::policy::PolicyDecision;
use crate::resolve::TransformationResolver;

use super::env::PipelineEnv;
use super::rejection::Rejection;
use super::stage::{Stage, StageResult};
use super::state::PipelineState;

/// Owner name reported for endpoint-table hits.
pub const ENDPOINT_TABLE: &str = "endpoint";

pub fn stages() -> Vec<Box<dyn Stage>> {
    vec![
        Box::new(RateLimit),
        Box::new(InputValidation),
        Box::new(Sanitize),
        Box::new(ShortcutRewrite),
        Box::new(Authenticate),
    ]
}

fn decision(decision: PolicyDecision) -> StageResult {
    match decision {
        PolicyDecision::Pass => StageResult::Continue,
        PolicyDecision::Reject { kind, msg } => StageResult::Reject(Rejection::new(Tier::Micro, kind, msg)),
    }
}

pub struct RateLimit;

#[async_trait]
impl Stage for RateLimit {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    fn reaches(&self) -> Option<PipelineState> {
        Some(PipelineState::Identified)
    }

    async fn run(&self, env: &PipelineEnv, ctx: &mut RequestContext) -> StageResult {
        ctx.micro.client = Some(ctx.client_id.clone());
        decision(env.endpoint.check_rate(&ctx.client_id))
    }
}

pub struct InputValidation;

#[async_trait]
impl Stage for InputValidation {
    fn name(&self) -> &'static str {
        "input_validation"
    }

    fn reaches(&self) -> Option<PipelineState> {
        Some(PipelineState::Validated)
    }

    async fn run(&self, env: &PipelineEnv, ctx: &mut RequestContext) -> StageResult {
        decision(env.endpoint.check_input(&ctx.method, ctx.content_length, &ctx.headers))
    }
}

pub struct Sanitize;

#[async_trait]
impl Stage for Sanitize {
    fn name(&self) -> &'static str {
        "sanitize"
    }

    async fn run(&self, _env: &PipelineEnv, ctx: &mut RequestContext) -> StageResult {
        if let Some(body) = ctx.body.take() {
            ctx.body = Some(sanitize_value(body));
        }
        StageResult::Continue
    }
}

/// Local endpoint table only; no graph traversal at this tier.
pub struct ShortcutRewrite;

#[async_trait]
impl Stage for ShortcutRewrite {
    fn name(&self) -> &'static str {
        "shortcut_rewrite"
    }

    fn reaches(&self) -> Option<PipelineState> {
        Some(PipelineState::Transformed)
    }

    async fn run(&self, env: &PipelineEnv, ctx: &mut RequestContext) -> StageResult {
        let Some(hit) = TransformationResolver::resolve_local(ENDPOINT_TABLE, &env.micro_rules, &ctx.path) else {
            return StageResult::Continue;
        };

        tracing::debug!(
            tier = "MICRO",
            correlation_id = %ctx.correlation_id,
            from = %ctx.path,
            to = %hit.longcut,
            "shortcut rewrite"
        );
        env.metrics.rewrites.inc(&[("tier", Tier::Micro.as_str())]);

        ctx.set_response_header(headers::SECURITY_LEVEL, Tier::Micro.as_str());
        ctx.set_response_header(headers::TRANSFORMATION, "SHORTCUT_TO_LONGCUT");
        ctx.set_response_header(headers::WALLET_CONTEXT, wallet_hint(&env.wallet));
        ctx.micro.transformation = Some(hit);
        StageResult::Continue
    }
}

/// First ten characters of the wallet, elided.
fn wallet_hint(wallet: &str) -> String {
    let head: String = wallet.chars().take(10).collect();
    format!("{head}...")
}

/// No `authorization` header is a 401; a refused token is a 403.
pub struct Authenticate;

#[async_trait]
impl Stage for Authenticate {
    fn name(&self) -> &'static str {
        "authenticate"
    }

    async fn run(&self, env: &PipelineEnv, ctx: &mut RequestContext) -> StageResult {
        let Some(token) = ctx.bearer_token() else {
            return StageResult::Reject(
                Rejection::new(Tier::Micro, RejectKind::AuthenticationFailure, "no token provided")
                    .with_status(401)
                    .with_message("Access denied: No token provided"),
            );
        };

        let gctx = env
            .gate_context(Tier::Micro, ctx)
            .with_credential(Some(token))
            .with_transformation(ctx.micro.transformation.clone());
        match env
            .consult(&env.gates.authentication, &gctx, ctx, |o| {
                Rejection::new(Tier::Micro, RejectKind::AuthenticationFailure, o.reason.clone())
                    .with_status(403)
                    .with_message("Access denied: Invalid token")
            })
            .await
        {
            Ok(outcome) => {
                ctx.micro.principal = Some(outcome.reference.unwrap_or_else(|| "bearer".to_string()));
                StageResult::Continue
            }
            Err(stop) => stop,
        }
    }
}
