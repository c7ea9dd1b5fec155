//! Tier pipelines.
//!
//! Each tier is an ordered list of [`Stage`]s interpreted by [`TierPipeline`].
//! A stage either continues with the context updated in place, rejects, or
//! reports cancellation; the first non-continue result ends the tier and is
//! written to the tier's audit trail.

pub mod env;
pub mod macro_tier;
pub mod mezzo_tier;
pub mod micro_tier;
pub mod rejection;
pub mod stage;
pub mod state;
pub mod tier;

pub use env::PipelineEnv;
pub use rejection::Rejection;
pub use stage::{Stage, StageResult};
pub use state::PipelineState;
pub use tier::{CounterSnapshot, TierOutcome, TierPipeline, TierReport};
