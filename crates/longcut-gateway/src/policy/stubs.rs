//! Pass-through gate implementations shipped with the gateway.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::gate::{GateContext, GateOutcome, PolicyGate};

/// Accepts every request. Used for governance, compliance and cross-service
/// checks until a real backend is plugged in.
pub struct ApproveAll {
    name: &'static str,
    reason: &'static str,
}

impl ApproveAll {
    pub fn governance() -> Self {
        Self {
            name: "governance",
            reason: "governance approved",
        }
    }

    pub fn compliance() -> Self {
        Self {
            name: "compliance",
            reason: "compliance checks passed",
        }
    }

    pub fn cross_service() -> Self {
        Self {
            name: "cross_service",
            reason: "dependency policies satisfied",
        }
    }
}

#[async_trait]
impl PolicyGate for ApproveAll {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn validate(&self, _ctx: &GateContext) -> GateOutcome {
        GateOutcome::accept(self.reason)
    }
}

/// Blockchain gate stand-in: accepts and issues a reference hash over
/// `wallet:longcut:correlation_id`.
#[derive(Default)]
pub struct LedgerStub;

impl LedgerStub {
    pub fn reference(wallet: &str, longcut: &str, correlation_id: &str) -> String {
        let mut h = Sha256::new();
        h.update(wallet.as_bytes());
        h.update(b":");
        h.update(longcut.as_bytes());
        h.update(b":");
        h.update(correlation_id.as_bytes());
        hex::encode(h.finalize())
    }
}

#[async_trait]
impl PolicyGate for LedgerStub {
    fn name(&self) -> &'static str {
        "blockchain"
    }

    async fn validate(&self, ctx: &GateContext) -> GateOutcome {
        let reference = Self::reference(&ctx.wallet, ctx.longcut(), &ctx.correlation_id.to_string());
        GateOutcome::accept("transformation recorded").with_reference(reference)
    }
}
