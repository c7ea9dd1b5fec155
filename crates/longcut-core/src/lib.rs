//! longcut core: transport-agnostic primitives shared by the gateway and tooling.
//!
//! Tiers, transformation rules and their ordered tables, correlation ids and the
//! rejection taxonomy live here. The crate carries no runtime or transport
//! dependencies so the same contracts can be reused by adapters and tests.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! Fallible paths surface as `LongcutError`/`Result`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod correlation;
pub mod error;
pub mod rule;
pub mod tier;

pub use correlation::CorrelationId;
pub use error::{LongcutError, RejectKind, Result};
pub use rule::{RuleTable, TransformationRule};
pub use tier::{RuleScope, SecurityTier, Tier};
