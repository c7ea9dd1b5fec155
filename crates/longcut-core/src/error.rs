//! Shared error types across longcut crates.

use thiserror::Error;

/// Rejection kinds surfaced to callers (stable API).
///
/// The string form, default status and security level of each kind are part of
/// the observable contract and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectKind {
    /// Macro governance gate rejected the request.
    GovernanceDenied,
    /// Blockchain gate rejected the transformation.
    BlockchainValidationFailed,
    /// Compliance gate reported violations.
    ComplianceViolation,
    /// Target service is not registered.
    ServiceNotFound,
    /// A declared dependency is stale, missing, or a gate timed out.
    DependencyUnavailable,
    /// A dependency's policy check failed.
    CrossServiceValidationFailed,
    /// Request rate over threshold.
    RateLimitExceeded,
    /// Request body over the configured limit.
    OversizedRequest,
    /// HTTP method not in the allowed set.
    MethodNotAllowed,
    /// A configured required header is absent.
    MissingRequiredHeader,
    /// Missing or invalid token.
    AuthenticationFailure,
    /// Uncaught failure inside a gate or resolver.
    InternalPipelineError,
}

impl RejectKind {
    /// String representation used in JSON responses and metrics labels.
    pub fn as_str(self) -> &'static str {
        match self {
            RejectKind::GovernanceDenied => "GovernanceDenied",
            RejectKind::BlockchainValidationFailed => "BlockchainValidationFailed",
            RejectKind::ComplianceViolation => "ComplianceViolation",
            RejectKind::ServiceNotFound => "ServiceNotFound",
            RejectKind::DependencyUnavailable => "DependencyUnavailable",
            RejectKind::CrossServiceValidationFailed => "CrossServiceValidationFailed",
            RejectKind::RateLimitExceeded => "RateLimitExceeded",
            RejectKind::OversizedRequest => "OversizedRequest",
            RejectKind::MethodNotAllowed => "MethodNotAllowed",
            RejectKind::MissingRequiredHeader => "MissingRequiredHeader",
            RejectKind::AuthenticationFailure => "AuthenticationFailure",
            RejectKind::InternalPipelineError => "InternalPipelineError",
        }
    }

    /// Status used when the rejecting stage does not pick one explicitly.
    pub fn default_status(self) -> u16 {
        match self {
            RejectKind::GovernanceDenied
            | RejectKind::BlockchainValidationFailed
            | RejectKind::ComplianceViolation
            | RejectKind::CrossServiceValidationFailed
            | RejectKind::AuthenticationFailure => 403,
            RejectKind::ServiceNotFound => 404,
            RejectKind::DependencyUnavailable => 503,
            RejectKind::RateLimitExceeded => 429,
            RejectKind::OversizedRequest => 413,
            RejectKind::MethodNotAllowed => 405,
            RejectKind::MissingRequiredHeader => 400,
            RejectKind::InternalPipelineError => 500,
        }
    }

    /// Client-facing error message.
    pub fn message(self) -> &'static str {
        match self {
            RejectKind::GovernanceDenied => "Enterprise governance validation failed",
            RejectKind::BlockchainValidationFailed => "Blockchain security validation failed",
            RejectKind::ComplianceViolation => "Enterprise compliance validation failed",
            RejectKind::ServiceNotFound => "Service not found in security graph",
            RejectKind::DependencyUnavailable => "Service dependencies not available",
            RejectKind::CrossServiceValidationFailed => "Cross-service security validation failed",
            RejectKind::RateLimitExceeded => "Too many requests",
            RejectKind::OversizedRequest => "Request too large",
            RejectKind::MethodNotAllowed => "Method not allowed",
            RejectKind::MissingRequiredHeader => "Required header missing",
            RejectKind::AuthenticationFailure => "Access denied",
            RejectKind::InternalPipelineError => "Security system error",
        }
    }

    /// `securityLevel` field of the rejection body.
    ///
    /// Authentication failures split on status: 401 means no token was
    /// presented, anything else means the token was refused.
    pub fn security_level(self, status: u16) -> &'static str {
        match self {
            RejectKind::GovernanceDenied => "MACRO_GOVERNANCE_BLOCKED",
            RejectKind::BlockchainValidationFailed => "MACRO_BLOCKCHAIN_BLOCKED",
            RejectKind::ComplianceViolation => "MACRO_COMPLIANCE_BLOCKED",
            RejectKind::ServiceNotFound => "MEZZO_BLOCKED",
            RejectKind::DependencyUnavailable => "MEZZO_DEPENDENCY_FAILED",
            RejectKind::CrossServiceValidationFailed => "MEZZO_CROSS_SERVICE_BLOCKED",
            RejectKind::RateLimitExceeded => "MICRO_RATE_LIMITED",
            RejectKind::OversizedRequest => "MICRO_SIZE_LIMIT",
            RejectKind::MethodNotAllowed => "MICRO_METHOD_BLOCKED",
            RejectKind::MissingRequiredHeader => "MICRO_HEADER_BLOCKED",
            RejectKind::AuthenticationFailure if status == 401 => "MICRO_BLOCKED",
            RejectKind::AuthenticationFailure => "MICRO_REJECTED",
            RejectKind::InternalPipelineError => "SYSTEM_ERROR",
        }
    }
}

impl std::fmt::Display for RejectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, LongcutError>;

/// Configuration and administrative failures.
#[derive(Debug, Error)]
pub enum LongcutError {
    #[error("invalid config: {0}")]
    Config(String),
    #[error("unsupported config version: {0}")]
    UnsupportedVersion(u32),
    #[error("unknown node: {0}")]
    UnknownNode(String),
    #[error("internal: {0}")]
    Internal(String),
}
