//! Per-request context shared by all tiers.
//!
//! The context is transport-agnostic: the HTTP adapter fills it from a request,
//! tiers enrich it in place, and the adapter turns the result back into a
//! response. Header names are stored lower-case.

use std::collections::BTreeMap;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use longcut_core::{CorrelationId, Tier};

use crate::audit::{ContextSnapshot, ValidatorResult};
use crate::resolve::ResolvedTransformation;

/// Stable header names.
pub mod headers {
    pub const SERVICE_ECOSYSTEM: &str = "x-service-ecosystem";
    pub const SERVICE_NAME: &str = "x-service-name";
    pub const CORRELATION_ID: &str = "x-correlation-id";
    pub const AUTHORIZATION: &str = "authorization";
    pub const CONTENT_LENGTH: &str = "content-length";

    pub const SECURITY_LEVEL: &str = "x-security-level";
    pub const ECOSYSTEM: &str = "x-ecosystem";
    pub const BLOCKCHAIN_INTEGRATION: &str = "x-blockchain-integration";
    pub const SERVICE_GRAPH: &str = "x-service-graph";
    pub const TRANSFORMATION_DEPTH: &str = "x-transformation-depth";
    pub const TRANSFORMATION: &str = "x-transformation";
    pub const ORCHESTRATION: &str = "x-orchestration";
    /// Read from the request when present, otherwise minted by Mezzo.
    pub const ORCHESTRATION_ID: &str = "x-orchestration-id";
    pub const WALLET_CONTEXT: &str = "x-wallet-context";
    pub const GOVERNANCE: &str = "x-governance";
}

#[derive(Debug, Clone, Default)]
pub struct MacroEnrichment {
    pub ecosystem: Option<String>,
    pub transformation: Option<ResolvedTransformation>,
    pub ledger_reference: Option<String>,
    pub validators: Vec<ValidatorResult>,
}

#[derive(Debug, Clone, Default)]
pub struct MezzoEnrichment {
    pub service: Option<String>,
    pub orchestration_id: Option<String>,
    /// Declared dependencies that passed the availability check.
    pub dependencies: Vec<String>,
    pub transformation: Option<ResolvedTransformation>,
    pub validators: Vec<ValidatorResult>,
}

#[derive(Debug, Clone, Default)]
pub struct MicroEnrichment {
    pub client: Option<String>,
    pub transformation: Option<ResolvedTransformation>,
    /// Accepted bearer token holder.
    pub principal: Option<String>,
    pub validators: Vec<ValidatorResult>,
}

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub correlation_id: CorrelationId,
    pub method: String,
    pub path: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Value>,
    pub content_length: Option<usize>,
    /// Rate-limit key (peer address or similar).
    pub client_id: String,
    pub cancel: CancellationToken,

    pub macro_tier: MacroEnrichment,
    pub mezzo: MezzoEnrichment,
    pub micro: MicroEnrichment,

    pub response_headers: BTreeMap<String, String>,
}

impl RequestContext {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        let correlation_id = CorrelationId::new();
        let mut response_headers = BTreeMap::new();
        response_headers.insert(headers::CORRELATION_ID.to_string(), correlation_id.to_string());

        Self {
            correlation_id,
            method: method.into().to_ascii_uppercase(),
            path: path.into(),
            headers: BTreeMap::new(),
            body: None,
            content_length: None,
            client_id: "anonymous".to_string(),
            cancel: CancellationToken::new(),
            macro_tier: MacroEnrichment::default(),
            mezzo: MezzoEnrichment::default(),
            micro: MicroEnrichment::default(),
            response_headers,
        }
    }

    /// Add a request header. `x-correlation-id` and `content-length` are also
    /// lifted into their typed fields.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        let name = name.to_ascii_lowercase();
        let value = value.into();

        match name.as_str() {
            headers::CORRELATION_ID => {
                self.correlation_id = CorrelationId::from_header(Some(&value));
                self.set_response_header(headers::CORRELATION_ID, self.correlation_id.to_string());
            }
            headers::CONTENT_LENGTH => {
                self.content_length = value.trim().parse().ok();
            }
            _ => {}
        }

        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_client(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// `None` when no `authorization` header was sent; otherwise the token
    /// after the scheme (possibly empty).
    pub fn bearer_token(&self) -> Option<String> {
        let raw = self.header(headers::AUTHORIZATION)?;
        let token = raw.split_once(' ').map(|(_, t)| t.trim()).unwrap_or("");
        Some(token.to_string())
    }

    pub fn set_response_header(&mut self, name: &str, value: impl Into<String>) {
        self.response_headers.insert(name.to_string(), value.into());
    }

    pub fn transformation(&self, tier: Tier) -> Option<&ResolvedTransformation> {
        match tier {
            Tier::Macro => self.macro_tier.transformation.as_ref(),
            Tier::Mezzo => self.mezzo.transformation.as_ref(),
            Tier::Micro => self.micro.transformation.as_ref(),
        }
    }

    /// Most specific rewrite applied so far, or the raw path.
    pub fn routed_path(&self) -> &str {
        [Tier::Micro, Tier::Mezzo, Tier::Macro]
            .into_iter()
            .find_map(|t| self.transformation(t))
            .map(|t| t.longcut.as_str())
            .unwrap_or(self.path.as_str())
    }

    pub fn push_validator(&mut self, tier: Tier, result: ValidatorResult) {
        match tier {
            Tier::Macro => self.macro_tier.validators.push(result),
            Tier::Mezzo => self.mezzo.validators.push(result),
            Tier::Micro => self.micro.validators.push(result),
        }
    }

    /// Tier-specific view written into the audit trail.
    pub fn audit_snapshot(&self, tier: Tier) -> ContextSnapshot {
        let (target, transformation, dependency_chain, validators) = match tier {
            Tier::Macro => (
                self.macro_tier.ecosystem.clone(),
                self.macro_tier.transformation.as_ref(),
                Vec::new(),
                self.macro_tier.validators.clone(),
            ),
            Tier::Mezzo => (
                self.mezzo.service.clone(),
                self.mezzo.transformation.as_ref(),
                self.mezzo.dependencies.clone(),
                self.mezzo.validators.clone(),
            ),
            Tier::Micro => (
                self.micro.client.clone(),
                self.micro.transformation.as_ref(),
                Vec::new(),
                self.micro.validators.clone(),
            ),
        };

        let dependency_chain = match transformation {
            Some(t) if !t.via.is_empty() => t.via.clone(),
            _ => dependency_chain,
        };

        ContextSnapshot {
            method: self.method.clone(),
            path: self.path.clone(),
            target,
            matched_rule: transformation.map(|t| t.rule.shortcut.clone()),
            longcut: transformation.map(|t| t.longcut.clone()),
            dependency_chain,
            validators,
        }
    }
}
