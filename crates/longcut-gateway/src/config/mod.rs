//! Gateway config loader (strict parsing).

pub mod schema;

use std::fs;

use longcut_core::error::{LongcutError, Result};

pub use schema::{
    AuditSection, EcosystemConfig, GatewayConfig, GatewaySection, GovernanceConfig, MacroSection,
    MezzoSection, MicroSection, RateLimitConfig, RuleConfig, ServiceConfig,
};

/// Static definitions shipped with the gateway.
const BUILTIN: &str = include_str!("../../config/builtin.yaml");

pub fn load_from_file(path: &str) -> Result<GatewayConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| LongcutError::Internal(format!("read config failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<GatewayConfig> {
    let cfg: GatewayConfig = serde_yaml::from_str(s)
        .map_err(|e| LongcutError::Config(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}

pub fn load_builtin() -> Result<GatewayConfig> {
    load_from_str(BUILTIN)
}
