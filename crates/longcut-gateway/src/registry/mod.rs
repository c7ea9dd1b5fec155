//! Keyed node registries (Mezzo services, Macro ecosystems).
//!
//! Registries are read by every in-flight request and written only by
//! administrative operations. Writers build a new snapshot and swap it in, so a
//! reader always sees whole nodes from one consistent generation.

mod admin;
mod heartbeat;
mod node;
mod store;

pub use admin::Registries;
pub use heartbeat::spawn_heartbeat;
pub use node::{EcosystemNode, Governance, RegistryNode, ServiceNode};
pub use store::{Registry, Snapshot};
