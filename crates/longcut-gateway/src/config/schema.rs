use std::collections::HashSet;

use serde::Deserialize;
use longcut_core::error::{LongcutError, Result};
use longcut_core::{RuleScope, SecurityTier, TransformationRule};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    pub version: u32,

    #[serde(default)]
    pub gateway: GatewaySection,

    #[serde(default)]
    pub audit: AuditSection,

    #[serde(default)]
    pub micro: MicroSection,

    #[serde(default)]
    pub mezzo: MezzoSection,

    #[serde(default, rename = "macro")]
    pub macro_tier: MacroSection,
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(LongcutError::UnsupportedVersion(self.version));
        }

        self.gateway.validate()?;
        self.audit.validate()?;
        self.micro.validate()?;
        self.mezzo.validate()?;
        self.macro_tier.validate()?;

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewaySection {
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Upper bound for one policy gate call.
    #[serde(default = "default_gate_timeout_ms")]
    pub gate_timeout_ms: u64,

    #[serde(default = "default_max_resolution_depth")]
    pub max_resolution_depth: usize,

    /// A dependency counts as healthy if checked within this window.
    #[serde(default = "default_health_freshness_ms")]
    pub health_freshness_ms: u64,

    /// 0 disables the heartbeat task.
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    #[serde(default = "default_wallet")]
    pub wallet: String,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            gate_timeout_ms: default_gate_timeout_ms(),
            max_resolution_depth: default_max_resolution_depth(),
            health_freshness_ms: default_health_freshness_ms(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            wallet: default_wallet(),
        }
    }
}

impl GatewaySection {
    pub fn validate(&self) -> Result<()> {
        if !(100..=60000).contains(&self.gate_timeout_ms) {
            return Err(LongcutError::Config(
                "gateway.gate_timeout_ms must be between 100 and 60000".into(),
            ));
        }
        if !(1..=32).contains(&self.max_resolution_depth) {
            return Err(LongcutError::Config(
                "gateway.max_resolution_depth must be between 1 and 32".into(),
            ));
        }
        if !(1000..=MAX_HEALTH_FRESHNESS_MS).contains(&self.health_freshness_ms) {
            return Err(LongcutError::Config(
                "gateway.health_freshness_ms must be between 1000 and 86400000".into(),
            ));
        }
        if self.heartbeat_interval_ms != 0 && self.heartbeat_interval_ms >= self.health_freshness_ms {
            return Err(LongcutError::Config(
                "gateway.heartbeat_interval_ms must be smaller than health_freshness_ms".into(),
            ));
        }
        Ok(())
    }
}

/// One day.
pub const MAX_HEALTH_FRESHNESS_MS: u64 = 86_400_000;

fn default_listen() -> String {
    "0.0.0.0:8080".into()
}
fn default_gate_timeout_ms() -> u64 {
    3000
}
fn default_max_resolution_depth() -> usize {
    5
}
fn default_health_freshness_ms() -> u64 {
    60000
}
fn default_heartbeat_interval_ms() -> u64 {
    30000
}
fn default_wallet() -> String {
    "0x21cC30462B8392Aa250453704019800092a16165".into()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditSection {
    #[serde(default = "default_micro_capacity")]
    pub micro_capacity: usize,
    #[serde(default = "default_mezzo_capacity")]
    pub mezzo_capacity: usize,
    #[serde(default = "default_macro_capacity")]
    pub macro_capacity: usize,
}

impl Default for AuditSection {
    fn default() -> Self {
        Self {
            micro_capacity: default_micro_capacity(),
            mezzo_capacity: default_mezzo_capacity(),
            macro_capacity: default_macro_capacity(),
        }
    }
}

impl AuditSection {
    pub fn validate(&self) -> Result<()> {
        if self.micro_capacity == 0 || self.mezzo_capacity == 0 || self.macro_capacity == 0 {
            return Err(LongcutError::Config("audit capacities must be at least 1".into()));
        }
        Ok(())
    }
}

fn default_micro_capacity() -> usize {
    1000
}
fn default_mezzo_capacity() -> usize {
    5000
}
fn default_macro_capacity() -> usize {
    10000
}

/// Shortcut entry as written in config. Flags left out fall back to the
/// defaults of the tier the rule is declared in.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleConfig {
    pub shortcut: String,
    pub longcut: String,
    #[serde(default)]
    pub requires_governance: Option<bool>,
    #[serde(default)]
    pub requires_blockchain_validation: Option<bool>,
}

impl RuleConfig {
    pub fn compile(&self, scope: RuleScope, policy_default: bool) -> TransformationRule {
        let mut rule = TransformationRule::new(&self.shortcut, &self.longcut, scope);
        rule.requires_governance = self.requires_governance.unwrap_or(policy_default);
        rule.requires_blockchain_validation =
            self.requires_blockchain_validation.unwrap_or(policy_default);
        rule
    }

    fn validate(&self, owner: &str) -> Result<()> {
        if !self.shortcut.starts_with('/') {
            return Err(LongcutError::Config(format!(
                "{owner}: shortcut {} must start with '/'",
                self.shortcut
            )));
        }
        if self.longcut.is_empty() {
            return Err(LongcutError::Config(format!(
                "{owner}: longcut for {} must not be empty",
                self.shortcut
            )));
        }
        Ok(())
    }
}

fn validate_rules(owner: &str, rules: &[RuleConfig]) -> Result<()> {
    rules.iter().try_for_each(|r| r.validate(owner))
}

fn ensure_unique<'a>(section: &str, names: impl Iterator<Item = &'a str>) -> Result<()> {
    let mut seen = HashSet::new();
    for n in names {
        if n.is_empty() {
            return Err(LongcutError::Config(format!("{section}: name must not be empty")));
        }
        if !seen.insert(n) {
            return Err(LongcutError::Config(format!("{section}: duplicate name {n}")));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_ms: default_window_ms(),
        }
    }
}

fn default_max_requests() -> u32 {
    100
}
fn default_window_ms() -> u64 {
    15 * 60 * 1000
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MicroSection {
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    #[serde(default = "default_allowed_methods")]
    pub allowed_methods: Vec<String>,

    #[serde(default)]
    pub required_headers: Vec<String>,

    /// HS256 signing secret. Unset means a random per-process secret.
    #[serde(default)]
    pub jwt_secret: Option<String>,

    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,

    /// Serve `POST /auth/login`.
    #[serde(default)]
    pub login_enabled: bool,

    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

impl Default for MicroSection {
    fn default() -> Self {
        Self {
            rate_limit: RateLimitConfig::default(),
            max_body_bytes: default_max_body_bytes(),
            allowed_methods: default_allowed_methods(),
            required_headers: Vec::new(),
            jwt_secret: None,
            token_ttl_secs: default_token_ttl_secs(),
            login_enabled: false,
            rules: Vec::new(),
        }
    }
}

impl MicroSection {
    pub fn validate(&self) -> Result<()> {
        if self.rate_limit.max_requests == 0 || self.rate_limit.window_ms < 1000 {
            return Err(LongcutError::Config(
                "micro.rate_limit needs max_requests >= 1 and window_ms >= 1000".into(),
            ));
        }
        if self.max_body_bytes == 0 {
            return Err(LongcutError::Config("micro.max_body_bytes must be at least 1".into()));
        }
        if self.allowed_methods.is_empty() {
            return Err(LongcutError::Config("micro.allowed_methods must not be empty".into()));
        }
        if self.jwt_secret.as_ref().is_some_and(|s| s.len() < 32) {
            return Err(LongcutError::Config(
                "micro.jwt_secret must be at least 32 bytes".into(),
            ));
        }
        if !(60..=2_592_000).contains(&self.token_ttl_secs) {
            return Err(LongcutError::Config(
                "micro.token_ttl_secs must be between 60 and 2592000".into(),
            ));
        }
        validate_rules("micro", &self.rules)
    }
}

fn default_token_ttl_secs() -> u64 {
    3600
}
fn default_max_body_bytes() -> usize {
    1024 * 1024
}
fn default_allowed_methods() -> Vec<String> {
    ["GET", "POST", "PUT", "DELETE"].iter().map(|m| m.to_string()).collect()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    pub name: String,
    #[serde(default)]
    pub security_tier: SecurityTier,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MezzoSection {
    #[serde(default = "default_service")]
    pub default_service: String,
    #[serde(default)]
    pub services: Vec<ServiceConfig>,
}

impl Default for MezzoSection {
    fn default() -> Self {
        Self {
            default_service: default_service(),
            services: Vec::new(),
        }
    }
}

impl MezzoSection {
    pub fn validate(&self) -> Result<()> {
        ensure_unique("mezzo.services", self.services.iter().map(|s| s.name.as_str()))?;
        for s in &self.services {
            validate_rules(&s.name, &s.rules)?;
        }
        Ok(())
    }
}

fn default_service() -> String {
    "default".into()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GovernanceConfig {
    #[serde(default = "default_compliance_level")]
    pub compliance_level: String,
    #[serde(default = "default_audit_frequency")]
    pub audit_frequency: String,
    #[serde(default = "default_escalation_path")]
    pub escalation_path: Vec<String>,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            compliance_level: default_compliance_level(),
            audit_frequency: default_audit_frequency(),
            escalation_path: default_escalation_path(),
        }
    }
}

fn default_compliance_level() -> String {
    "ENTERPRISE".into()
}
fn default_audit_frequency() -> String {
    "CONTINUOUS".into()
}
fn default_escalation_path() -> Vec<String> {
    ["SECURITY_TEAM", "GOVERNANCE_BOARD", "BLOCKCHAIN_VALIDATORS"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EcosystemConfig {
    pub name: String,
    #[serde(default)]
    pub security_tier: SecurityTier,
    #[serde(default)]
    pub services: Vec<String>,
    /// Lower-cased path fragments for the identification heuristic.
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub governance: GovernanceConfig,
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MacroSection {
    #[serde(default = "default_ecosystem")]
    pub default_ecosystem: String,
    /// Applied to every ecosystem ahead of its own rules.
    #[serde(default)]
    pub universal_rules: Vec<RuleConfig>,
    #[serde(default)]
    pub ecosystems: Vec<EcosystemConfig>,
}

impl Default for MacroSection {
    fn default() -> Self {
        Self {
            default_ecosystem: default_ecosystem(),
            universal_rules: Vec::new(),
            ecosystems: Vec::new(),
        }
    }
}

impl MacroSection {
    pub fn validate(&self) -> Result<()> {
        ensure_unique("macro.ecosystems", self.ecosystems.iter().map(|e| e.name.as_str()))?;
        validate_rules("macro.universal_rules", &self.universal_rules)?;
        for e in &self.ecosystems {
            validate_rules(&e.name, &e.rules)?;
            if e.keywords.iter().any(|k| k.is_empty() || k.to_lowercase() != *k) {
                return Err(LongcutError::Config(format!(
                    "{}: keywords must be non-empty and lower-case",
                    e.name
                )));
            }
        }
        Ok(())
    }
}

fn default_ecosystem() -> String {
    "default".into()
}
