//! Tier and scope enums.

use serde::{Deserialize, Serialize};

/// Cascading validation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier {
    /// Endpoint level.
    Micro,
    /// Service level.
    Mezzo,
    /// Ecosystem level.
    Macro,
}

impl Tier {
    /// Dispatch order: Macro runs first, Micro last.
    pub const PIPELINE_ORDER: [Tier; 3] = [Tier::Macro, Tier::Mezzo, Tier::Micro];

    /// Value of the `x-security-level` header and metrics label.
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Micro => "MICRO",
            Tier::Mezzo => "MEZZO",
            Tier::Macro => "MACRO",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a transformation rule was declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleScope {
    Endpoint,
    Service,
    Ecosystem,
}

/// Security classification of a registry node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecurityTier {
    #[default]
    MezzoProtected,
    Maximum,
    EnterpriseCritical,
    AiOrchestrationCritical,
    BlockchainCritical,
    ResearchCritical,
}
