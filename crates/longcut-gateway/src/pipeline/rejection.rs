use serde_json::{json, Map, Value};

use longcut_core::{CorrelationId, RejectKind, Tier};

/// Terminal refusal produced by a stage.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub tier: Tier,
    pub kind: RejectKind,
    pub status: u16,
    /// Operator-facing reason; goes to logs and the audit trail.
    pub reason: String,
    message: Option<String>,
    details: Map<String, Value>,
}

impl Rejection {
    pub fn new(tier: Tier, kind: RejectKind, reason: impl Into<String>) -> Self {
        Self {
            tier,
            kind,
            status: kind.default_status(),
            reason: reason.into(),
            message: None,
            details: Map::new(),
        }
    }

    pub fn internal(tier: Tier, reason: impl Into<String>) -> Self {
        Self::new(tier, RejectKind::InternalPipelineError, reason)
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Override the client-facing `error` text.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    pub fn detail(&self, key: &str) -> Option<&Value> {
        self.details.get(key)
    }

    pub fn security_level(&self) -> &'static str {
        self.kind.security_level(self.status)
    }

    pub fn message(&self) -> &str {
        self.message.as_deref().unwrap_or(self.kind.message())
    }

    /// JSON body returned to the client. Internal errors carry nothing but a
    /// generic message and the correlation id.
    pub fn body(&self, correlation_id: CorrelationId) -> Value {
        let mut body = json!({
            "error": self.message(),
            "kind": self.kind.as_str(),
            "securityLevel": self.security_level(),
            "correlationId": correlation_id.to_string(),
        });

        if self.kind != RejectKind::InternalPipelineError {
            if let Value::Object(map) = &mut body {
                for (k, v) in &self.details {
                    map.insert(k.clone(), v.clone());
                }
            }
        }
        body
    }
}
