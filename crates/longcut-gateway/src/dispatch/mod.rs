//! Dispatcher module exports.
//!
//! The dispatcher composes the three tier pipelines and exposes status and
//! administrative access to the registries behind them.

pub mod dispatcher;
pub mod status;

pub use dispatcher::{DispatchOutcome, Dispatched, UnifiedDispatcher};
pub use status::{AuditStatus, HealthSummary, StatusReport, TierStatus};
