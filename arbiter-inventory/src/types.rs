//! Shared types for the inventory layer.

use serde::{Deserialize, Serialize};

/// One running process, best-effort populated. `is_signed` means "the
/// binary carries non-empty publisher metadata" — an approximation, not
/// a cryptographic signature check.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRecord {
    pub name: String,
    pub pid: i32,
    pub file_path: String,
    pub file_hash: String,
    pub command_line: String,
    pub file_version: String,
    pub is_signed: bool,
    pub signature_info: String,
    pub memory_usage: u64,
    pub start_time: String,
}

/// One loaded kernel driver/module. Same publisher approximation as
/// [`ProcessRecord::is_signed`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverRecord {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub path_name: String,
    pub start_type: String,
    pub state: String,
    pub is_signed: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HardwareSummary {
    pub cpu: String,
    pub gpu: String,
    pub gpu_driver_version: String,
    pub ram: String,
    pub motherboard: String,
    pub storage: String,
    pub network_adapters: String,
    pub bios_version: String,
    pub hardware_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemFacts {
    pub os_version: String,
    pub computer_name: String,
    pub username: String,
    pub screen_resolution: String,
    pub last_boot_time: String,
    pub time_zone: String,
    pub agent_version: String,
}
