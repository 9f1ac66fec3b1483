//! Shared types for the device layer.

use serde::{Deserialize, Serialize};

/// Coarse device-risk classification for the compliance dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrustLevel {
    Trusted,
    Unknown,
    External,
}

/// One plug-and-play entity as reported to the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    pub device_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub manufacturer: String,
    #[serde(default)]
    pub device_type: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub class_guid: String,
    #[serde(default)]
    pub driver: String,
    #[serde(default)]
    pub hardware_id: String,
    pub trust_level: TrustLevel,
}

impl DeviceRecord {
    /// Minimal record for a detach notification naming a device we never
    /// saw attach.
    pub fn minimal(device_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            name: name.into(),
            description: String::new(),
            manufacturer: String::new(),
            device_type: String::new(),
            status: String::new(),
            class_guid: String::new(),
            driver: String::new(),
            hardware_id: String::new(),
            trust_level: TrustLevel::Unknown,
        }
    }
}

/// An attach or detach transition observed by the reconciler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceChange {
    pub device: DeviceRecord,
    pub attached: bool,
    pub timestamp: i64,
}

/// Canonical record for one physical display, accumulated across the
/// four discovery probes. `data_sources` records which probes
/// contributed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorRecord {
    pub device_id: String,
    pub pnp_device_id: String,
    pub device_path: String,
    pub name: String,
    pub description: String,
    pub monitor_id: String,
    pub manufacturer: String,
    pub model: String,
    pub serial_number: String,
    pub year_of_manufacture: u32,
    pub week_of_manufacture: u32,
    pub screen_width: u32,
    pub screen_height: u32,
    pub work_area_width: u32,
    pub work_area_height: u32,
    pub bits_per_pixel: u32,
    pub is_primary: bool,
    pub graphics_card: String,
    pub data_sources: Vec<String>,
}

/// Display-adapter class GUID used for monitor records downstream.
pub const DISPLAY_CLASS_GUID: &str = "{4D36E96E-E325-11CE-BFC1-08002BE10318}";

impl MonitorRecord {
    pub fn resolution_string(&self) -> String {
        if self.screen_width > 0 && self.screen_height > 0 {
            format!("{}x{}", self.screen_width, self.screen_height)
        } else {
            "Unknown Resolution".to_string()
        }
    }

    pub fn friendly_name(&self) -> String {
        let brand = if !self.manufacturer.is_empty() && self.manufacturer != "Unknown" {
            self.manufacturer.as_str()
        } else {
            ""
        };
        let resolution = if self.screen_width > 0 && self.screen_height > 0 {
            format!(" ({}x{})", self.screen_width, self.screen_height)
        } else {
            String::new()
        };
        if !brand.is_empty() || !self.model.is_empty() {
            return format!("{brand} {}{resolution}", self.model).trim().to_string();
        }
        if !self.name.is_empty() && self.name != "Unknown Monitor" {
            format!("{}{resolution}", self.name)
        } else {
            format!("Monitor{resolution}")
        }
    }

    /// Record a contributing probe without duplicating provenance tags.
    pub fn add_source(&mut self, source: &str) {
        if !self.data_sources.iter().any(|s| s == source) {
            self.data_sources.push(source.to_string());
        }
    }

    /// Flatten into the generic device shape for the snapshot. Monitors
    /// are never treated as external-risk devices.
    pub fn to_device_record(&self) -> DeviceRecord {
        DeviceRecord {
            device_id: self.device_id.clone(),
            name: self.friendly_name(),
            description: format!("{} - {}", self.resolution_string(), self.description)
                .trim_end_matches(" - ")
                .to_string(),
            manufacturer: self.manufacturer.clone(),
            device_type: "Monitor".to_string(),
            status: "OK".to_string(),
            class_guid: DISPLAY_CLASS_GUID.to_string(),
            driver: self.graphics_card.clone(),
            hardware_id: self.pnp_device_id.clone(),
            trust_level: TrustLevel::Trusted,
        }
    }
}
