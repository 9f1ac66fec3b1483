//! # Arbiter Core — shared foundation for the telemetry agent
//!
//! Every arbiter crate links against this library for:
//! - **Configuration** — environment-driven [`AgentConfig`]
//! - **Errors** — the [`AgentError`] taxonomy and [`AgentResult`] alias
//! - **Session identity** — the immutable [`SessionContext`] that scopes
//!   all telemetry to one subject/channel pair

pub mod config;
pub mod error;
pub mod session;

mod tests;

pub use config::AgentConfig;
pub use error::{AgentError, AgentResult};
pub use session::SessionContext;

/// Sentinel used wherever a best-effort field could not be resolved.
pub const UNKNOWN: &str = "Unknown";
/// Sentinel for optional enrichment fields that failed to populate.
pub const NOT_AVAILABLE: &str = "N/A";
