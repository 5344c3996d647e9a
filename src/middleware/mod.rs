//! HTTP middleware.
//!
//! Request logging with latency tracking. Bearer-token gating lives in
//! `crate::auth::middleware`.

pub mod logging;

pub use logging::request_logging;
