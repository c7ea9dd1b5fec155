//! Ecosystem-level stages.

use async_trait::async_trait;

use longcut_core::{RejectKind, Tier};

use crate::context::{headers, RequestContext};
use crate::resolve::Resolution;

use super::env::PipelineEnv;
use super::rejection::Rejection;
use super::stage::{Stage, StageResult};
use super::state::PipelineState;

pub fn stages() -> Vec<Box<dyn Stage>> {
    vec![
        Box::new(IdentifyEcosystem),
        Box::new(GovernanceGate),
        Box::new(GlobalTransformation),
        Box::new(BlockchainGate),
        Box::new(ComplianceGate),
    ]
}

fn ecosystem_of(ctx: &RequestContext) -> String {
    ctx.macro_tier.ecosystem.clone().unwrap_or_default()
}

/// Header first (when registered), then path keywords in registry order,
/// then the configured default.
pub struct IdentifyEcosystem;

#[async_trait]
impl Stage for IdentifyEcosystem {
    fn name(&self) -> &'static str {
        "identify_ecosystem"
    }

    fn reaches(&self) -> Option<PipelineState> {
        Some(PipelineState::Identified)
    }

    async fn run(&self, env: &PipelineEnv, ctx: &mut RequestContext) -> StageResult {
        let ecosystems = env.registries.ecosystems.snapshot();

        let from_header = ctx
            .header(headers::SERVICE_ECOSYSTEM)
            .filter(|h| ecosystems.contains(h))
            .map(str::to_string);

        let ecosystem = from_header
            .or_else(|| {
                let lower = ctx.path.to_ascii_lowercase();
                ecosystems
                    .iter()
                    .find(|e| e.matches_keyword(&lower))
                    .map(|e| e.name.clone())
            })
            .unwrap_or_else(|| env.default_ecosystem.clone());

        ctx.set_response_header(headers::ECOSYSTEM, ecosystem.as_str());
        ctx.macro_tier.ecosystem = Some(ecosystem);
        StageResult::Continue
    }
}

pub struct GovernanceGate;

#[async_trait]
impl Stage for GovernanceGate {
    fn name(&self) -> &'static str {
        "governance"
    }

    fn reaches(&self) -> Option<PipelineState> {
        Some(PipelineState::Validated)
    }

    async fn run(&self, env: &PipelineEnv, ctx: &mut RequestContext) -> StageResult {
        let ecosystem = ecosystem_of(ctx);
        let escalation = env
            .registries
            .ecosystems
            .get(&ecosystem)
            .and_then(|e| e.governance.escalation());

        let gctx = env.gate_context(Tier::Macro, ctx).with_target(ecosystem);
        match env
            .consult(&env.gates.governance, &gctx, ctx, |o| {
                Rejection::new(Tier::Macro, RejectKind::GovernanceDenied, o.reason.clone())
                    .with_detail("governanceReason", o.reason.clone())
                    .with_detail(
                        "escalationPath",
                        o.escalation.clone().or(escalation).unwrap_or_default(),
                    )
            })
            .await
        {
            Ok(_) => StageResult::Continue,
            Err(stop) => stop,
        }
    }
}

/// Ecosystem rules first, then member services as edges into the service
/// graph. Service-graph hits are embedded under the governance prefix.
pub struct GlobalTransformation;

#[async_trait]
impl Stage for GlobalTransformation {
    fn name(&self) -> &'static str {
        "global_transformation"
    }

    fn reaches(&self) -> Option<PipelineState> {
        Some(PipelineState::Transformed)
    }

    async fn run(&self, env: &PipelineEnv, ctx: &mut RequestContext) -> StageResult {
        let ecosystem = ecosystem_of(ctx);
        let Some(node) = env.registries.ecosystems.get(&ecosystem) else {
            return StageResult::Continue;
        };
        let services = env.registries.services.snapshot();

        let Resolution::Found(mut hit) = env.resolver.resolve(&*node, &services, &ctx.path) else {
            return StageResult::Continue;
        };
        if hit.owner != node.name {
            hit = hit.into_macro_embedded();
        }

        tracing::debug!(
            tier = "MACRO",
            correlation_id = %ctx.correlation_id,
            ecosystem = %ecosystem,
            from = %ctx.path,
            to = %hit.longcut,
            depth = hit.depth,
            "global transformation"
        );
        env.metrics.rewrites.inc(&[("tier", Tier::Macro.as_str())]);

        let integration = if hit.rule.requires_blockchain_validation {
            "ENABLED"
        } else {
            "DISABLED"
        };
        ctx.set_response_header(headers::SECURITY_LEVEL, Tier::Macro.as_str());
        ctx.set_response_header(headers::BLOCKCHAIN_INTEGRATION, integration);
        ctx.set_response_header(headers::WALLET_CONTEXT, env.wallet.as_str());
        ctx.set_response_header(headers::GOVERNANCE, node.governance.compliance_level.as_str());
        ctx.macro_tier.transformation = Some(hit);
        StageResult::Continue
    }
}

/// Runs only when the matched rule asks for ledger validation.
pub struct BlockchainGate;

#[async_trait]
impl Stage for BlockchainGate {
    fn name(&self) -> &'static str {
        "blockchain"
    }

    async fn run(&self, env: &PipelineEnv, ctx: &mut RequestContext) -> StageResult {
        let transformation = match &ctx.macro_tier.transformation {
            Some(t) if t.rule.requires_blockchain_validation => t.clone(),
            _ => return StageResult::Continue,
        };

        let gctx = env
            .gate_context(Tier::Macro, ctx)
            .with_target(ecosystem_of(ctx))
            .with_transformation(Some(transformation));
        match env
            .consult(&env.gates.blockchain, &gctx, ctx, |o| {
                Rejection::new(Tier::Macro, RejectKind::BlockchainValidationFailed, o.reason.clone())
                    .with_detail("blockchainReason", o.reason.clone())
                    .with_detail("transactionHash", o.reference.clone().unwrap_or_default())
            })
            .await
        {
            Ok(outcome) => {
                ctx.macro_tier.ledger_reference = outcome.reference;
                StageResult::Continue
            }
            Err(stop) => stop,
        }
    }
}

pub struct ComplianceGate;

#[async_trait]
impl Stage for ComplianceGate {
    fn name(&self) -> &'static str {
        "compliance"
    }

    async fn run(&self, env: &PipelineEnv, ctx: &mut RequestContext) -> StageResult {
        let gctx = env
            .gate_context(Tier::Macro, ctx)
            .with_target(ecosystem_of(ctx))
            .with_transformation(ctx.macro_tier.transformation.clone());
        match env
            .consult(&env.gates.compliance, &gctx, ctx, |o| {
                Rejection::new(Tier::Macro, RejectKind::ComplianceViolation, o.reason.clone())
                    .with_detail("complianceViolations", o.violations.clone())
                    .with_detail("requiredActions", o.required_actions.clone())
            })
            .await
        {
            Ok(_) => StageResult::Continue,
            Err(stop) => stop,
        }
    }
}
