//! Top-level facade crate for longcut.
//!
//! Re-exports core types and the gateway library so users can depend on a single crate.

pub mod core {
    pub use longcut_core::*;
}

pub mod gateway {
    pub use longcut_gateway::*;
}
