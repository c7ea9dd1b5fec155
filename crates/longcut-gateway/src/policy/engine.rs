use std::collections::BTreeMap;
use std::time::Duration;

use longcut_core::RejectKind;

use crate::config::MicroSection;

use super::limiter::ClientRateLimiter;

/// Decision from endpoint policy evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyDecision {
    Pass,
    Reject { kind: RejectKind, msg: String },
}

impl PolicyDecision {
    fn reject(kind: RejectKind, msg: impl Into<String>) -> Self {
        PolicyDecision::Reject {
            kind,
            msg: msg.into(),
        }
    }
}

/// Endpoint-level limits compiled from the `micro` config section.
/// Construct once at startup, then share via Arc.
pub struct EndpointPolicy {
    limiter: ClientRateLimiter,
    max_body_bytes: usize,
    allowed_methods: Vec<String>,
    required_headers: Vec<String>,
}

impl EndpointPolicy {
    pub fn new(cfg: &MicroSection) -> Self {
        Self {
            limiter: ClientRateLimiter::new(
                cfg.rate_limit.max_requests,
                Duration::from_millis(cfg.rate_limit.window_ms),
            ),
            max_body_bytes: cfg.max_body_bytes,
            allowed_methods: cfg.allowed_methods.iter().map(|m| m.to_ascii_uppercase()).collect(),
            required_headers: cfg.required_headers.iter().map(|h| h.to_ascii_lowercase()).collect(),
        }
    }

    pub fn limiter(&self) -> &ClientRateLimiter {
        &self.limiter
    }

    pub fn check_rate(&self, client: &str) -> PolicyDecision {
        if self.limiter.allow(client) {
            PolicyDecision::Pass
        } else {
            PolicyDecision::reject(RejectKind::RateLimitExceeded, format!("rate limit exceeded for {client}"))
        }
    }

    /// Size, then method, then required headers. `headers` keys are lower-case.
    pub fn check_input(
        &self,
        method: &str,
        content_length: Option<usize>,
        headers: &BTreeMap<String, String>,
    ) -> PolicyDecision {
        if let Some(len) = content_length {
            if len > self.max_body_bytes {
                return PolicyDecision::reject(
                    RejectKind::OversizedRequest,
                    format!("body of {len} bytes exceeds {}", self.max_body_bytes),
                );
            }
        }

        if !self.allowed_methods.iter().any(|m| m.eq_ignore_ascii_case(method)) {
            return PolicyDecision::reject(RejectKind::MethodNotAllowed, format!("method {method} not allowed"));
        }

        if let Some(missing) = self.required_headers.iter().find(|h| !headers.contains_key(h.as_str())) {
            return PolicyDecision::reject(
                RejectKind::MissingRequiredHeader,
                format!("missing required header {missing}"),
            );
        }

        PolicyDecision::Pass
    }
}
