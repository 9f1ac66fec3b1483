//! Multi-source display discovery and fusion.
//!
//! Four partial probes each see a different slice of a monitor's
//! identity. They are merged into one canonical [`MonitorRecord`] per
//! physical display, keyed by the best stable identifier available and
//! falling back to positional index for probes that have none. Probe
//! order is authoritative: the live-geometry probe owns resolution and
//! the primary flag, the EDID probe owns manufacturer/model/serial, and
//! both run after the coarser sources they supersede.

use crate::types::MonitorRecord;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Coarse registry-style view: names, advertised resolution, PnP id.
#[derive(Debug, Clone, Default)]
pub struct CoarseView {
    pub device_id: String,
    pub name: String,
    pub description: String,
    pub manufacturer: String,
    pub screen_width: u32,
    pub screen_height: u32,
    pub pnp_device_id: String,
}

/// Per-adapter, per-monitor walk: device path plus a vendor-coded id.
#[derive(Debug, Clone, Default)]
pub struct AdapterView {
    /// Stable id of the form `MONITOR\XXX1234\...`
    pub device_id: String,
    /// The adapter-relative path, e.g. `\\.\DISPLAY1\Monitor0`
    pub device_path: String,
    pub description: String,
    pub adapter_name: String,
}

/// Live geometry of an active display. Positional: index i in this list
/// aligns with the i-th discovered record.
#[derive(Debug, Clone, Default)]
pub struct GeometryView {
    pub width: u32,
    pub height: u32,
    pub work_area_width: u32,
    pub work_area_height: u32,
    pub bits_per_pixel: u32,
    pub is_primary: bool,
}

/// Self-reported identification block from the display itself.
#[derive(Debug, Clone, Default)]
pub struct EdidView {
    pub instance_name: String,
    pub manufacturer: String,
    pub model: String,
    pub serial_number: String,
    pub year_of_manufacture: u32,
    pub week_of_manufacture: u32,
}

/// The OS probing seam: each method runs one independent discovery pass.
pub trait MonitorProbeSource: Send + Sync {
    fn coarse(&self) -> Vec<CoarseView>;
    fn adapters(&self) -> Vec<AdapterView>;
    fn geometry(&self) -> Vec<GeometryView>;
    fn edid(&self) -> Vec<EdidView>;
}

/// EDID vendor codes are three letters; unrecognized codes pass through
/// unchanged.
pub fn decode_vendor_code(code: &str) -> String {
    match code.to_uppercase().as_str() {
        "ACI" => "Ancor Communications Inc",
        "ACR" => "Acer",
        "AUO" => "AU Optronics",
        "APP" => "Apple",
        "BNQ" => "BenQ",
        "CMI" => "Chimei Innolux",
        "DEL" => "Dell",
        "HPN" => "HP",
        "HWP" => "HP",
        "LEN" => "Lenovo",
        "LGD" => "LG Display",
        "LPL" => "LG Philips",
        "NEC" => "NEC",
        "SAM" => "Samsung",
        "SEC" => "Seiko Epson",
        "SHP" => "Sharp",
        "SNY" => "Sony",
        "VSC" => "ViewSonic",
        _ => return code.to_string(),
    }
    .to_string()
}

pub struct MonitorFuser {
    probes: Box<dyn MonitorProbeSource>,
    fusions_completed: AtomicU64,
}

impl MonitorFuser {
    pub fn new(probes: Box<dyn MonitorProbeSource>) -> Self {
        Self {
            probes,
            fusions_completed: AtomicU64::new(0),
        }
    }

    /// Run all four probes and fuse their views.
    pub fn detect(&self) -> Vec<MonitorRecord> {
        self.fusions_completed.fetch_add(1, Ordering::Relaxed);
        let mut records = Vec::new();
        Self::apply_coarse(&mut records, self.probes.coarse());
        Self::apply_adapters(&mut records, self.probes.adapters());
        Self::apply_geometry(&mut records, self.probes.geometry());
        Self::apply_edid(&mut records, self.probes.edid());
        debug!(monitors = records.len(), "monitor fusion complete");
        records
    }

    pub fn fusions_completed(&self) -> u64 {
        self.fusions_completed.load(Ordering::Relaxed)
    }

    /// Probe 1: seed records from the coarse enumeration. Model and
    /// monitor-id substrings come from splitting the PnP path.
    pub fn apply_coarse(records: &mut Vec<MonitorRecord>, views: Vec<CoarseView>) {
        for view in views {
            let record = Self::find_or_create(records, &view.device_id);
            record.name = if view.name.is_empty() {
                "Unknown Monitor".to_string()
            } else {
                view.name
            };
            record.description = view.description;
            if !view.manufacturer.is_empty() {
                record.manufacturer = view.manufacturer;
            }
            record.screen_width = view.screen_width;
            record.screen_height = view.screen_height;
            if !view.pnp_device_id.is_empty() {
                record.pnp_device_id = view.pnp_device_id.clone();
                if let Some(rest) = view.pnp_device_id.strip_prefix("DISPLAY\\") {
                    let mut parts = rest.split('\\');
                    if let Some(model) = parts.next() {
                        record.model = model.to_string();
                    }
                    if let Some(monitor_id) = parts.next() {
                        record.monitor_id = monitor_id.to_string();
                    }
                }
            }
            record.add_source("pnp");
        }
    }

    /// Probe 2: adapter walk. Vendor 3-letter codes are decoded; the
    /// adapter string doubles as the graphics-card name.
    pub fn apply_adapters(records: &mut Vec<MonitorRecord>, views: Vec<AdapterView>) {
        for view in views {
            let record = Self::find_or_create(records, &view.device_id);
            record.device_path = view.device_path;
            if !view.description.is_empty() {
                record.description = view.description;
            }
            record.graphics_card = view.adapter_name;
            if let Some(pos) = view.device_id.find("MONITOR\\") {
                let id_segment = view.device_id[pos + "MONITOR\\".len()..]
                    .split('\\')
                    .next()
                    .unwrap_or("");
                // Id segments are either `VEN&product` or the fused
                // `VENproduct` EDID form (3-letter vendor prefix)
                let (vendor, product) = match id_segment.split_once('&') {
                    Some(pair) => pair,
                    None if id_segment.len() > 3 => id_segment.split_at(3),
                    None => (id_segment, ""),
                };
                if vendor.len() >= 3 {
                    record.manufacturer = decode_vendor_code(&vendor[..3]);
                }
                if !product.is_empty() {
                    record.model = product.to_string();
                }
            }
            record.add_source("adapter");
        }
    }

    /// Probe 3: live geometry, aligned positionally. Index i updates the
    /// i-th known record; the list only grows when the live display list
    /// is longer than everything discovered so far.
    pub fn apply_geometry(records: &mut Vec<MonitorRecord>, views: Vec<GeometryView>) {
        for (i, view) in views.into_iter().enumerate() {
            if i >= records.len() {
                let mut record = MonitorRecord {
                    device_id: format!("SCREEN_{i}"),
                    name: format!("Display {}", i + 1),
                    ..Default::default()
                };
                record.add_source("geometry");
                records.push(record);
            }
            let record = &mut records[i];
            record.screen_width = view.width;
            record.screen_height = view.height;
            record.work_area_width = view.work_area_width;
            record.work_area_height = view.work_area_height;
            record.bits_per_pixel = view.bits_per_pixel;
            record.is_primary = view.is_primary;
            record.add_source("geometry");
        }
    }

    /// Probe 4: EDID identification, matched by instance-name substring
    /// against each record's stable id. When neither the PnP id nor the
    /// device id matches, the block lands on the first known record —
    /// this can misattribute serials on multi-monitor hosts with
    /// ambiguous identifiers (see DESIGN.md).
    pub fn apply_edid(records: &mut Vec<MonitorRecord>, views: Vec<EdidView>) {
        for view in views {
            if view.instance_name.is_empty() {
                continue;
            }
            let index = Self::match_edid(records, &view.instance_name);
            let Some(index) = index else { continue };
            let record = &mut records[index];
            if !view.manufacturer.is_empty() {
                record.manufacturer = view.manufacturer;
            }
            if !view.model.is_empty() {
                record.model = view.model;
            }
            if !view.serial_number.is_empty() {
                record.serial_number = view.serial_number;
            }
            if view.year_of_manufacture > 0 {
                record.year_of_manufacture = view.year_of_manufacture;
            }
            if view.week_of_manufacture > 0 {
                record.week_of_manufacture = view.week_of_manufacture;
            }
            record.add_source("edid");
        }
    }

    fn match_edid(records: &[MonitorRecord], instance_name: &str) -> Option<usize> {
        let by_segment = |id: &str| {
            !id.is_empty()
                && id
                    .rsplit('\\')
                    .next()
                    .is_some_and(|seg| !seg.is_empty() && instance_name.contains(seg))
        };
        if let Some(i) = records.iter().position(|r| by_segment(&r.pnp_device_id)) {
            return Some(i);
        }
        if let Some(i) = records.iter().position(|r| by_segment(&r.device_id)) {
            return Some(i);
        }
        // Ambiguous fallback: first known record
        if records.is_empty() {
            None
        } else {
            Some(0)
        }
    }

    fn find_or_create<'a>(
        records: &'a mut Vec<MonitorRecord>,
        device_id: &str,
    ) -> &'a mut MonitorRecord {
        if let Some(i) = records.iter().position(|r| r.device_id == device_id) {
            return &mut records[i];
        }
        records.push(MonitorRecord {
            device_id: device_id.to_string(),
            ..Default::default()
        });
        records.last_mut().expect("just pushed")
    }
}
