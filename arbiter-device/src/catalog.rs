//! Plug-and-play device catalog with trust classification.

use crate::types::{DeviceRecord, TrustLevel};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Identity strings containing any of these mark a device as external
/// media regardless of manufacturer.
const EXTERNAL_KEYWORDS: &[&str] = &[
    "usb",
    "flash",
    "removable",
    "portable",
    "external",
    "card reader",
    "memory stick",
    "sandisk",
    "kingston",
    "cruzer",
];

/// Manufacturers whose internal devices are considered part of the
/// expected platform.
const TRUSTED_MANUFACTURERS: &[&str] = &[
    "microsoft",
    "intel",
    "amd",
    "nvidia",
    "realtek",
    "logitech",
    "dell",
    "hp",
    "lenovo",
    "asus",
    "msi",
    "gigabyte",
    "corsair",
];

/// Raw identity fields for one enumerated entity, before classification.
#[derive(Debug, Clone, Default)]
pub struct RawDeviceEntry {
    pub device_id: String,
    pub name: String,
    pub description: String,
    pub manufacturer: String,
    pub status: String,
    pub class_guid: String,
}

/// The OS enumeration seam. One call returns every present PnP entity;
/// per-entity extraction failures are the enumerator's to swallow.
pub trait DeviceEnumerator: Send + Sync {
    fn enumerate(&self) -> Vec<RawDeviceEntry>;
}

/// Classify a device from its four identity strings.
///
/// Pure and order-independent: the external check always wins, so a USB
/// drive from a trusted chipset vendor is still External.
pub fn classify_device(
    device_id: &str,
    name: &str,
    description: &str,
    manufacturer: &str,
) -> TrustLevel {
    let identity = format!("{device_id} {name} {description} {manufacturer}").to_lowercase();
    if EXTERNAL_KEYWORDS.iter().any(|kw| identity.contains(kw)) {
        return TrustLevel::External;
    }
    let manufacturer = manufacturer.to_lowercase();
    if TRUSTED_MANUFACTURERS.iter().any(|m| manufacturer.contains(m)) {
        return TrustLevel::Trusted;
    }
    TrustLevel::Unknown
}

/// One-pass catalog over an enumeration source.
pub struct DeviceCatalog {
    enumerator: Box<dyn DeviceEnumerator>,
    scans_completed: AtomicU64,
    devices_seen: AtomicU64,
}

impl DeviceCatalog {
    pub fn new(enumerator: Box<dyn DeviceEnumerator>) -> Self {
        Self {
            enumerator,
            scans_completed: AtomicU64::new(0),
            devices_seen: AtomicU64::new(0),
        }
    }

    /// Enumerate all present entities and classify each one.
    pub fn scan(&self) -> Vec<DeviceRecord> {
        self.scans_completed.fetch_add(1, Ordering::Relaxed);
        let entries = self.enumerator.enumerate();
        let mut records = Vec::with_capacity(entries.len());

        for entry in entries {
            if entry.device_id.is_empty() {
                warn!(name = %entry.name, "skipping device without an id");
                continue;
            }
            let trust_level = classify_device(
                &entry.device_id,
                &entry.name,
                &entry.description,
                &entry.manufacturer,
            );
            records.push(DeviceRecord {
                device_id: entry.device_id,
                name: if entry.name.is_empty() {
                    "Unknown Device".to_string()
                } else {
                    entry.name
                },
                description: entry.description,
                manufacturer: entry.manufacturer,
                device_type: String::new(),
                status: entry.status,
                class_guid: entry.class_guid,
                driver: String::new(),
                hardware_id: String::new(),
                trust_level,
            });
        }

        self.devices_seen
            .fetch_add(records.len() as u64, Ordering::Relaxed);
        debug!(devices = records.len(), "device catalog scan complete");
        records
    }

    pub fn scans_completed(&self) -> u64 {
        self.scans_completed.load(Ordering::Relaxed)
    }

    pub fn devices_seen(&self) -> u64 {
        self.devices_seen.load(Ordering::Relaxed)
    }
}
