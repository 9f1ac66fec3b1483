//! # Arbiter Inventory — point-in-time host telemetry collection
//!
//! Collects the per-snapshot facts: running processes (with content
//! hashes and publisher metadata), loaded drivers, hardware summary,
//! system facts — and assembles them into the immutable [`Snapshot`]
//! the sync layer delivers.

pub mod drivers;
pub mod hardware;
pub mod processes;
pub mod snapshot;
pub mod system;
pub mod types;

pub use processes::{BinaryMetadataSource, NoMetadata, ProcessInventory};
pub use snapshot::{Snapshot, SnapshotBuilder};
pub use types::{DriverRecord, HardwareSummary, ProcessRecord, SystemFacts};
