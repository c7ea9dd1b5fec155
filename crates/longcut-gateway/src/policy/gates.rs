use std::sync::Arc;

use super::gate::PolicyGate;
use super::jwt::JwtAuthenticator;
use super::stubs::{ApproveAll, LedgerStub};
use crate::config::{GatewayConfig, GatewaySection, MicroSection};

/// Every gate the tiers consult. Swap any of them with the `with_*` builders.
#[derive(Clone)]
pub struct PolicyGates {
    pub governance: Arc<dyn PolicyGate>,
    pub blockchain: Arc<dyn PolicyGate>,
    pub compliance: Arc<dyn PolicyGate>,
    pub cross_service: Arc<dyn PolicyGate>,
    pub authentication: Arc<dyn PolicyGate>,
}

impl Default for PolicyGates {
    fn default() -> Self {
        let wallet = GatewaySection::default().wallet;
        Self::new(Arc::new(JwtAuthenticator::from_config(&MicroSection::default(), &wallet)))
    }
}

impl PolicyGates {
    /// Pass-through gates plus the given authentication gate.
    pub fn new(authentication: Arc<dyn PolicyGate>) -> Self {
        Self {
            governance: Arc::new(ApproveAll::governance()),
            blockchain: Arc::new(LedgerStub),
            compliance: Arc::new(ApproveAll::compliance()),
            cross_service: Arc::new(ApproveAll::cross_service()),
            authentication,
        }
    }

    /// Pass-through gates plus JWT authentication configured from `micro`.
    pub fn from_config(cfg: &GatewayConfig) -> Self {
        Self::new(Arc::new(JwtAuthenticator::from_config(&cfg.micro, &cfg.gateway.wallet)))
    }

    pub fn with_governance(mut self, gate: Arc<dyn PolicyGate>) -> Self {
        self.governance = gate;
        self
    }

    pub fn with_blockchain(mut self, gate: Arc<dyn PolicyGate>) -> Self {
        self.blockchain = gate;
        self
    }

    pub fn with_compliance(mut self, gate: Arc<dyn PolicyGate>) -> Self {
        self.compliance = gate;
        self
    }

    pub fn with_cross_service(mut self, gate: Arc<dyn PolicyGate>) -> Self {
        self.cross_service = gate;
        self
    }

    pub fn with_authentication(mut self, gate: Arc<dyn PolicyGate>) -> Self {
        self.authentication = gate;
        self
    }
}
