//! # Arbiter Net — kernel connection-table decoding
//!
//! Turns the raw extended TCP/UDP tables (entry count + fixed-size rows
//! with owning PIDs) into structured [`ConnectionRecord`]s for the
//! telemetry snapshot. The table source is a trait so the OS call and
//! its size-probe/fetch dance stay mockable.

pub mod table;
pub mod types;

pub use table::{fetch_connections, ConnectionTableSource, ProcessNameResolver};
pub use types::{ConnectionRecord, Protocol};

mod tests;
