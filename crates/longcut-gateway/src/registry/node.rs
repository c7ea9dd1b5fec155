use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use longcut_core::{RuleTable, SecurityTier, TransformationRule};

/// Anything a registry can hold: a named node with a rule table and outgoing
/// edges for distributed resolution.
pub trait RegistryNode: Send + Sync + 'static {
    fn name(&self) -> &str;
    fn rules(&self) -> &RuleTable;
    fn edges(&self) -> &[String];
}

/// Mezzo registry entry.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceNode {
    pub name: String,
    pub dependencies: Vec<String>,
    pub rules: RuleTable,
    pub security_tier: SecurityTier,
    pub last_health_check: DateTime<Utc>,
}

impl ServiceNode {
    /// Fresh node, counted as health-checked at creation.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dependencies: Vec::new(),
            rules: RuleTable::new(),
            security_tier: SecurityTier::default(),
            last_health_check: Utc::now(),
        }
    }

    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_rule(mut self, rule: TransformationRule) -> Self {
        self.rules.insert(rule);
        self
    }

    pub fn with_rules(mut self, rules: RuleTable) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_security_tier(mut self, tier: SecurityTier) -> Self {
        self.security_tier = tier;
        self
    }

    pub fn with_last_health_check(mut self, at: DateTime<Utc>) -> Self {
        self.last_health_check = at;
        self
    }

    /// Healthy means checked strictly within `freshness` of `now`.
    pub fn is_healthy(&self, now: DateTime<Utc>, freshness: Duration) -> bool {
        now.signed_duration_since(self.last_health_check) < freshness
    }
}

impl RegistryNode for ServiceNode {
    fn name(&self) -> &str {
        &self.name
    }
    fn rules(&self) -> &RuleTable {
        &self.rules
    }
    fn edges(&self) -> &[String] {
        &self.dependencies
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Governance {
    pub compliance_level: String,
    pub audit_frequency: String,
    pub escalation_path: Vec<String>,
}

impl Governance {
    /// Escalation chain rendered for rejection bodies.
    pub fn escalation(&self) -> Option<String> {
        if self.escalation_path.is_empty() {
            None
        } else {
            Some(self.escalation_path.join(" -> "))
        }
    }
}

/// Macro registry entry.
#[derive(Debug, Clone, Serialize)]
pub struct EcosystemNode {
    pub name: String,
    /// Member services; act as this node's edges into the service graph.
    pub member_services: Vec<String>,
    pub rules: RuleTable,
    pub governance: Governance,
    pub security_tier: SecurityTier,
    pub keywords: Vec<String>,
}

impl EcosystemNode {
    /// `lower_path` must already be lower-cased.
    pub fn matches_keyword(&self, lower_path: &str) -> bool {
        self.keywords.iter().any(|k| lower_path.contains(k.as_str()))
    }
}

impl RegistryNode for EcosystemNode {
    fn name(&self) -> &str {
        &self.name
    }
    fn rules(&self) -> &RuleTable {
        &self.rules
    }
    fn edges(&self) -> &[String] {
        &self.member_services
    }
}
