//! Policy layer (gates, endpoint limits, sanitization).
//!
//! Gates are injected capabilities consulted by the tiers; endpoint limits are
//! compiled once from config and evaluated synchronously.

pub mod engine;
pub mod gate;
pub mod gates;
pub mod invoke;
pub mod jwt;
pub mod limiter;
pub mod sanitize;
pub mod stubs;

pub use engine::{EndpointPolicy, PolicyDecision};
pub use gate::{GateContext, GateOutcome, PolicyGate};
pub use gates::PolicyGates;
pub use invoke::{GateRunner, GateVerdict};
pub use jwt::{AccessClaims, JwtAuthenticator};
pub use limiter::ClientRateLimiter;
pub use stubs::{ApproveAll, LedgerStub};
