//! longcut gateway library entry.
//!
//! This crate wires config, registries, resolution, policy gates, audit
//! trails and the three tier pipelines into one dispatcher, plus a thin HTTP
//! adapter. It is consumed by the binary (`main.rs`) and by integration tests.

pub mod app_state;
pub mod audit;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod obs;
pub mod ops;
pub mod pipeline;
pub mod policy;
pub mod registry;
pub mod resolve;
pub mod router;
pub mod transport;
