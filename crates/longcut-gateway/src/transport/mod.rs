//! Transport layer (HTTP).
//!
//! Translates HTTP requests into a `RequestContext`, runs the dispatcher and
//! translates the outcome back. Contains no policy logic.

pub mod http;
