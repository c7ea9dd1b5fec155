use chrono::Utc;
use serde::Serialize;

use longcut_core::Tier;

use crate::pipeline::CounterSnapshot;

use super::dispatcher::UnifiedDispatcher;

#[derive(Debug, Clone, Serialize)]
pub struct AuditStatus {
    pub len: usize,
    pub capacity: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TierStatus {
    pub tier: Tier,
    pub nodes: usize,
    pub rules: usize,
    pub stages: Vec<&'static str>,
    pub audit: AuditStatus,
    pub counters: CounterSnapshot,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthSummary {
    pub services: usize,
    pub healthy: usize,
    /// Registered services whose last health check is outside the window.
    pub stale: Vec<String>,
    pub freshness_ms: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub tiers: Vec<TierStatus>,
    pub health: HealthSummary,
    pub ecosystems: Vec<String>,
    pub services: Vec<String>,
}

impl StatusReport {
    pub fn tier(&self, tier: Tier) -> Option<&TierStatus> {
        self.tiers.iter().find(|t| t.tier == tier)
    }
}

pub(super) fn collect(d: &UnifiedDispatcher) -> StatusReport {
    let env = d.env();
    let services = env.registries.services.snapshot();
    let ecosystems = env.registries.ecosystems.snapshot();

    let tiers = Tier::PIPELINE_ORDER
        .into_iter()
        .map(|tier| {
            let (nodes, rules) = match tier {
                Tier::Macro => (ecosystems.len(), ecosystems.rule_count()),
                Tier::Mezzo => (services.len(), services.rule_count()),
                Tier::Micro => (0, env.micro_rules.len()),
            };
            let pipeline = d.pipeline(tier);
            TierStatus {
                tier,
                nodes,
                rules,
                stages: pipeline.stage_names(),
                audit: AuditStatus {
                    len: pipeline.trail().len(),
                    capacity: pipeline.trail().capacity(),
                },
                counters: pipeline.counters(),
            }
        })
        .collect();

    let now = Utc::now();
    let stale: Vec<String> = services
        .iter()
        .filter(|s| !s.is_healthy(now, env.health_freshness))
        .map(|s| s.name.clone())
        .collect();

    StatusReport {
        tiers,
        health: HealthSummary {
            services: services.len(),
            healthy: services.len() - stale.len(),
            stale,
            freshness_ms: env.health_freshness.num_milliseconds(),
        },
        ecosystems: ecosystems.keys().to_vec(),
        services: services.keys().to_vec(),
    }
}
