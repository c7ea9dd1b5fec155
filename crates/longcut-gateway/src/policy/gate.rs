use async_trait::async_trait;

use longcut_core::{CorrelationId, Tier};

use crate::resolve::ResolvedTransformation;

/// What a gate gets to see about the request.
#[derive(Debug, Clone)]
pub struct GateContext {
    pub tier: Tier,
    pub correlation_id: CorrelationId,
    pub method: String,
    pub path: String,
    /// Ecosystem (Macro) or service (Mezzo) under validation.
    pub target: Option<String>,
    /// Bearer token for authentication, absent for other gates.
    pub credential: Option<String>,
    /// Services checked by the cross-service gate.
    pub dependencies: Vec<String>,
    pub transformation: Option<ResolvedTransformation>,
    pub wallet: String,
}

impl GateContext {
    pub fn new(tier: Tier, correlation_id: CorrelationId, method: &str, path: &str) -> Self {
        Self {
            tier,
            correlation_id,
            method: method.to_string(),
            path: path.to_string(),
            target: None,
            credential: None,
            dependencies: Vec::new(),
            transformation: None,
            wallet: String::new(),
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_credential(mut self, credential: Option<String>) -> Self {
        self.credential = credential;
        self
    }

    pub fn with_dependencies(mut self, deps: Vec<String>) -> Self {
        self.dependencies = deps;
        self
    }

    pub fn with_transformation(mut self, t: Option<ResolvedTransformation>) -> Self {
        self.transformation = t;
        self
    }

    pub fn with_wallet(mut self, wallet: impl Into<String>) -> Self {
        self.wallet = wallet.into();
        self
    }

    /// Longcut under validation, falling back to the raw path.
    pub fn longcut(&self) -> &str {
        self.transformation
            .as_ref()
            .map(|t| t.longcut.as_str())
            .unwrap_or(self.path.as_str())
    }
}

/// Definite verdict of one gate call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GateOutcome {
    pub accepted: bool,
    pub reason: String,
    pub escalation: Option<String>,
    /// Opaque reference issued by the gate (ledger hash and the like).
    pub reference: Option<String>,
    pub violations: Vec<String>,
    pub required_actions: Vec<String>,
}

impl GateOutcome {
    pub fn accept(reason: impl Into<String>) -> Self {
        Self {
            accepted: true,
            reason: reason.into(),
            ..Self::default()
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            accepted: false,
            reason: reason.into(),
            ..Self::default()
        }
    }

    pub fn with_escalation(mut self, escalation: Option<String>) -> Self {
        self.escalation = escalation;
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn with_violations(mut self, violations: Vec<String>, required_actions: Vec<String>) -> Self {
        self.violations = violations;
        self.required_actions = required_actions;
        self
    }
}

/// Pluggable validator invoked by a tier.
///
/// Implementations must always return an outcome. The runner bounds every call
/// with a timeout and treats a panic as an internal error.
#[async_trait]
pub trait PolicyGate: Send + Sync {
    fn name(&self) -> &'static str;
    async fn validate(&self, ctx: &GateContext) -> GateOutcome;
}
