//! # Arbiter Device — attached-hardware inventory
//!
//! Three components own the device side of the telemetry snapshot:
//!
//! - [`catalog::DeviceCatalog`] — one-pass plug-and-play enumeration
//!   with trust classification
//! - [`monitor_fuser::MonitorFuser`] — fuses four partial display probes
//!   into one canonical record per physical monitor
//! - [`reconciler::DeviceReconciler`] — the authoritative attached set,
//!   fed by push notifications and the periodic scan fallback

pub mod catalog;
pub mod monitor_fuser;
pub mod reconciler;
pub mod types;

pub use catalog::{classify_device, DeviceCatalog, DeviceEnumerator};
pub use monitor_fuser::{MonitorFuser, MonitorProbeSource};
pub use reconciler::DeviceReconciler;
pub use types::{DeviceChange, DeviceRecord, MonitorRecord, TrustLevel};
