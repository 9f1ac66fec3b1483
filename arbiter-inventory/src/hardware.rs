//! Hardware summary collection.
//!
//! sysinfo covers CPU, memory, disks and network interfaces on every
//! platform; board/BIOS/GPU identity has no portable source and stays at
//! the Unknown sentinel unless an OS-specific probe fills it in. The
//! hardware id is a stable digest of the slow-changing identity fields.

use crate::types::HardwareSummary;
use arbiter_core::UNKNOWN;
use sha2::{Digest, Sha256};
use sysinfo::{Disks, Networks, System};

/// Board-level identity an OS-specific probe may supply.
#[derive(Debug, Clone, Default)]
pub struct BoardIdentity {
    pub gpu: String,
    pub gpu_driver_version: String,
    pub motherboard: String,
    pub bios_version: String,
}

pub fn collect(sys: &System, board: &BoardIdentity) -> HardwareSummary {
    let cpu = sys
        .cpus()
        .first()
        .map(|c| c.brand().trim().to_string())
        .filter(|b| !b.is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string());

    let ram_gb = sys.total_memory() / (1024 * 1024 * 1024);
    let ram = format!("{ram_gb} GB");

    let disks = Disks::new_with_refreshed_list();
    let storage = disks
        .iter()
        .map(|d| {
            let size_gb = d.total_space() as f64 / (1024.0 * 1024.0 * 1024.0);
            format!("{} ({size_gb:.1} GB)", d.name().to_string_lossy())
        })
        .collect::<Vec<_>>()
        .join(", ");

    let networks = Networks::new_with_refreshed_list();
    let network_adapters = networks
        .iter()
        .map(|(name, data)| format!("{name} ({})", data.mac_address()))
        .collect::<Vec<_>>()
        .join(", ");

    let or_unknown = |s: &str| {
        if s.is_empty() {
            UNKNOWN.to_string()
        } else {
            s.to_string()
        }
    };
    let motherboard = or_unknown(&board.motherboard);
    let bios_version = or_unknown(&board.bios_version);

    let hardware_id = hardware_id(&cpu, &motherboard, &bios_version);

    HardwareSummary {
        cpu,
        gpu: or_unknown(&board.gpu),
        gpu_driver_version: or_unknown(&board.gpu_driver_version),
        ram,
        motherboard,
        storage,
        network_adapters,
        bios_version,
        hardware_id,
    }
}

/// First 32 hex chars of SHA-256 over the pipe-joined identity fields.
pub fn hardware_id(cpu: &str, motherboard: &str, bios: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{cpu}|{motherboard}|{bios}").as_bytes());
    let digest = format!("{:X}", hasher.finalize());
    digest[..32].to_string()
}
