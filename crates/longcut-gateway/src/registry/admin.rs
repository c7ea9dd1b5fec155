use std::sync::Arc;

use chrono::{DateTime, Utc};

use longcut_core::error::{LongcutError, Result};
use longcut_core::{RuleScope, RuleTable};

use crate::config::GatewayConfig;

use super::node::{EcosystemNode, Governance, ServiceNode};
use super::store::Registry;

/// Both tier registries plus the only legal mutators for them.
#[derive(Default)]
pub struct Registries {
    pub services: Registry<ServiceNode>,
    pub ecosystems: Registry<EcosystemNode>,
}

impl Registries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Populate from static definitions. Every service starts health-checked now.
    pub fn from_config(cfg: &GatewayConfig) -> Self {
        let regs = Self::new();

        for s in &cfg.mezzo.services {
            let rules: RuleTable = s
                .rules
                .iter()
                .map(|r| r.compile(RuleScope::Service, false))
                .collect();
            regs.services.put(
                ServiceNode::new(&s.name)
                    .with_dependencies(s.dependencies.iter().cloned())
                    .with_rules(rules)
                    .with_security_tier(s.security_tier),
            );
        }

        for e in &cfg.macro_tier.ecosystems {
            // universal rules first, ecosystem-specific after
            let rules: RuleTable = cfg
                .macro_tier
                .universal_rules
                .iter()
                .chain(e.rules.iter())
                .map(|r| r.compile(RuleScope::Ecosystem, true))
                .collect();
            regs.ecosystems.put(EcosystemNode {
                name: e.name.clone(),
                member_services: e.services.clone(),
                rules,
                governance: Governance {
                    compliance_level: e.governance.compliance_level.clone(),
                    audit_frequency: e.governance.audit_frequency.clone(),
                    escalation_path: e.governance.escalation_path.clone(),
                },
                security_tier: e.security_tier,
                keywords: e.keywords.clone(),
            });
        }

        regs
    }

    /// Insert or replace a service node. Returns the replaced node.
    pub fn add_service_node(
        &self,
        name: &str,
        dependencies: Vec<String>,
        rules: RuleTable,
    ) -> Option<Arc<ServiceNode>> {
        self.put_service(
            ServiceNode::new(name)
                .with_dependencies(dependencies)
                .with_rules(rules),
        )
    }

    pub fn put_service(&self, node: ServiceNode) -> Option<Arc<ServiceNode>> {
        tracing::info!(service = %node.name, deps = ?node.dependencies, rules = node.rules.len(), "service node registered");
        self.services.put(node)
    }

    pub fn remove_service_node(&self, name: &str) -> Result<Arc<ServiceNode>> {
        let removed = self
            .services
            .remove(name)
            .ok_or_else(|| LongcutError::UnknownNode(name.to_string()))?;
        tracing::info!(service = %name, "service node removed");
        Ok(removed)
    }

    pub fn add_ecosystem_node(&self, node: EcosystemNode) -> Option<Arc<EcosystemNode>> {
        tracing::info!(ecosystem = %node.name, members = node.member_services.len(), rules = node.rules.len(), "ecosystem node registered");
        self.ecosystems.put(node)
    }

    pub fn remove_ecosystem_node(&self, name: &str) -> Result<Arc<EcosystemNode>> {
        let removed = self
            .ecosystems
            .remove(name)
            .ok_or_else(|| LongcutError::UnknownNode(name.to_string()))?;
        tracing::info!(ecosystem = %name, "ecosystem node removed");
        Ok(removed)
    }

    /// External health reporters call this; request handling never does.
    pub fn record_health_check(&self, name: &str, at: DateTime<Utc>) -> Result<()> {
        self.services
            .update(name, |n| n.clone().with_last_health_check(at))
            .map(|_| ())
            .ok_or_else(|| LongcutError::UnknownNode(name.to_string()))
    }

    pub fn record_all_healthy(&self, at: DateTime<Utc>) {
        self.services
            .update_all(|n| n.clone().with_last_health_check(at));
    }

    /// Dependencies / member services that point at unregistered services.
    pub fn dangling_references(&self) -> Vec<(String, String)> {
        let services = self.services.snapshot();
        let ecosystems = self.ecosystems.snapshot();

        let from_services = services.iter().flat_map(|s| {
            s.dependencies
                .iter()
                .filter(|d| !services.contains(d))
                .map(|d| (s.name.clone(), d.clone()))
                .collect::<Vec<_>>()
        });
        let from_ecosystems = ecosystems.iter().flat_map(|e| {
            e.member_services
                .iter()
                .filter(|m| !services.contains(m))
                .map(|m| (e.name.clone(), m.clone()))
                .collect::<Vec<_>>()
        });

        from_services.chain(from_ecosystems).collect()
    }
}
