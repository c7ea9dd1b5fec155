//! Service-level stages.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use longcut_core::{RejectKind, Tier};

use crate::context::{headers, RequestContext};
use crate::resolve::Resolution;

use super::env::PipelineEnv;
use super::rejection::Rejection;
use super::stage::{Stage, StageResult};
use super::state::PipelineState;

pub fn stages() -> Vec<Box<dyn Stage>> {
    vec![
        Box::new(IdentifyService),
        Box::new(DependencyAvailability),
        Box::new(DistributedTransformation),
        Box::new(CrossServiceGate),
    ]
}

fn service_of(ctx: &RequestContext) -> String {
    ctx.mezzo.service.clone().unwrap_or_default()
}

pub struct IdentifyService;

#[async_trait]
impl Stage for IdentifyService {
    fn name(&self) -> &'static str {
        "identify_service"
    }

    fn reaches(&self) -> Option<PipelineState> {
        Some(PipelineState::Identified)
    }

    async fn run(&self, env: &PipelineEnv, ctx: &mut RequestContext) -> StageResult {
        let service = ctx
            .header(headers::SERVICE_NAME)
            .map(str::to_string)
            .unwrap_or_else(|| env.default_service.clone());

        if !env.registries.services.snapshot().contains(&service) {
            return StageResult::Reject(
                Rejection::new(
                    Tier::Mezzo,
                    RejectKind::ServiceNotFound,
                    format!("service {service} is not registered"),
                )
                .with_detail("service", service),
            );
        }

        let orchestration_id = ctx
            .header(headers::ORCHESTRATION_ID)
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        ctx.set_response_header(headers::ORCHESTRATION_ID, orchestration_id.as_str());

        ctx.mezzo.service = Some(service);
        ctx.mezzo.orchestration_id = Some(orchestration_id);
        StageResult::Continue
    }
}

/// Every declared dependency must be registered and checked within the
/// freshness window.
pub struct DependencyAvailability;

#[async_trait]
impl Stage for DependencyAvailability {
    fn name(&self) -> &'static str {
        "dependency_availability"
    }

    fn reaches(&self) -> Option<PipelineState> {
        Some(PipelineState::Validated)
    }

    async fn run(&self, env: &PipelineEnv, ctx: &mut RequestContext) -> StageResult {
        let service = service_of(ctx);
        let services = env.registries.services.snapshot();
        let Some(node) = services.get(&service) else {
            return StageResult::Reject(Rejection::new(
                Tier::Mezzo,
                RejectKind::ServiceNotFound,
                format!("service {service} is not registered"),
            ));
        };

        let now = Utc::now();
        let failed: Vec<String> = node
            .dependencies
            .iter()
            .filter(|d| {
                services
                    .get(d)
                    .map_or(true, |dep| !dep.is_healthy(now, env.health_freshness))
            })
            .cloned()
            .collect();

        if !failed.is_empty() {
            return StageResult::Reject(
                Rejection::new(
                    Tier::Mezzo,
                    RejectKind::DependencyUnavailable,
                    format!("unavailable dependencies of {service}: {}", failed.join(", ")),
                )
                .with_detail("failedDependencies", failed),
            );
        }

        ctx.mezzo.dependencies = node.dependencies.clone();
        StageResult::Continue
    }
}

/// Resolution rooted at the identified service, falling back along its
/// dependency graph.
pub struct DistributedTransformation;

#[async_trait]
impl Stage for DistributedTransformation {
    fn name(&self) -> &'static str {
        "distributed_transformation"
    }

    fn reaches(&self) -> Option<PipelineState> {
        Some(PipelineState::Transformed)
    }

    async fn run(&self, env: &PipelineEnv, ctx: &mut RequestContext) -> StageResult {
        let service = service_of(ctx);
        let services = env.registries.services.snapshot();
        let Some(root) = services.get(&service) else {
            return StageResult::Continue;
        };

        let Resolution::Found(hit) = env.resolver.resolve(&**root, &services, &ctx.path) else {
            return StageResult::Continue;
        };

        tracing::debug!(
            tier = "MEZZO",
            correlation_id = %ctx.correlation_id,
            service = %service,
            owner = %hit.owner,
            from = %ctx.path,
            to = %hit.longcut,
            depth = hit.depth,
            "distributed transformation"
        );
        env.metrics.rewrites.inc(&[("tier", Tier::Mezzo.as_str())]);

        ctx.set_response_header(headers::SECURITY_LEVEL, Tier::Mezzo.as_str());
        ctx.set_response_header(headers::SERVICE_GRAPH, service.as_str());
        ctx.set_response_header(headers::ORCHESTRATION, "DISTRIBUTED");
        ctx.set_response_header(headers::TRANSFORMATION_DEPTH, hit.depth.to_string());
        ctx.mezzo.transformation = Some(hit);
        StageResult::Continue
    }
}

/// Checks every dependency of the matched rule's owner. Skipped when nothing
/// matched.
pub struct CrossServiceGate;

#[async_trait]
impl Stage for CrossServiceGate {
    fn name(&self) -> &'static str {
        "cross_service"
    }

    async fn run(&self, env: &PipelineEnv, ctx: &mut RequestContext) -> StageResult {
        let Some(transformation) = ctx.mezzo.transformation.clone() else {
            return StageResult::Continue;
        };
        let dependencies = env
            .registries
            .services
            .get(&transformation.owner)
            .map(|n| n.dependencies.clone())
            .unwrap_or_default();

        let mut failed = Vec::new();
        for dep in &dependencies {
            let gctx = env
                .gate_context(Tier::Mezzo, ctx)
                .with_target(dep.as_str())
                .with_dependencies(dependencies.clone())
                .with_transformation(Some(transformation.clone()));

            match env.verdict(&env.gates.cross_service, &gctx, ctx).await {
                Ok(outcome) if outcome.accepted => {}
                Ok(outcome) => failed.push(json!({ "service": dep, "reason": outcome.reason })),
                Err(stop) => return stop,
            }
        }

        if failed.is_empty() {
            return StageResult::Continue;
        }

        StageResult::Reject(
            Rejection::new(
                Tier::Mezzo,
                RejectKind::CrossServiceValidationFailed,
                format!("{} of {} dependencies refused", failed.len(), dependencies.len()),
            )
            .with_detail("failedServices", failed),
        )
    }
}
