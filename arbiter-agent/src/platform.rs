//! Host-OS data sources behind the collection seams.
//!
//! Everything here is best-effort: a source that finds nothing returns
//! an empty list and the telemetry pipeline carries on. The Windows
//! build swaps in registry/setupapi-backed sources through the same
//! traits.

use arbiter_core::{AgentError, AgentResult};
use arbiter_device::catalog::{DeviceEnumerator, RawDeviceEntry};
use arbiter_device::monitor_fuser::{
    AdapterView, CoarseView, EdidView, GeometryView, MonitorProbeSource,
};
use arbiter_net::table::ConnectionTableSource;
use arbiter_net::types::Protocol;
use arbiter_net::ProcessNameResolver;
use arbiter_sync::screenshot::{FrameCapture, FrameEncoder};
use std::path::Path;
use tracing::debug;

// ── connection table ────────────────────────────────────────────────

/// Presents `/proc/net/{tcp,udp}` in the extended-table wire layout so
/// the same decoder serves every platform's source. The table really can
/// grow between the size probe and the fetch, which exercises the
/// decoder's retry path.
pub struct ProcNetTableSource;

impl ProcNetTableSource {
    fn encode(&self, protocol: Protocol) -> Vec<u8> {
        let path = match protocol {
            Protocol::Tcp => "/proc/net/tcp",
            Protocol::Udp => "/proc/net/udp",
        };
        match std::fs::read_to_string(path) {
            Ok(contents) => encode_proc_net(protocol, &contents),
            Err(e) => {
                debug!(path, error = %e, "socket table unavailable");
                encode_proc_net(protocol, "")
            }
        }
    }
}

impl ConnectionTableSource for ProcNetTableSource {
    fn table_size(&self, protocol: Protocol) -> AgentResult<usize> {
        Ok(self.encode(protocol).len())
    }

    fn fill_table(&self, protocol: Protocol, buf: &mut Vec<u8>) -> AgentResult<()> {
        let table = self.encode(protocol);
        if buf.len() < table.len() {
            return Err(AgentError::InsufficientBuffer {
                needed: table.len(),
                have: buf.len(),
            });
        }
        buf[..table.len()].copy_from_slice(&table);
        Ok(())
    }
}

/// Serialize parsed `/proc/net` rows into the leading-count binary
/// layout the table decoder consumes.
pub fn encode_proc_net(protocol: Protocol, contents: &str) -> Vec<u8> {
    let mut rows: Vec<[u32; 6]> = Vec::new();
    for line in contents.lines().skip(1) {
        let mut fields = line.split_whitespace();
        let _slot = fields.next();
        let Some(local) = fields.next() else { continue };
        let Some(remote) = fields.next() else { continue };
        let Some(state_hex) = fields.next() else { continue };

        let Some((local_addr, local_port)) = split_hex_endpoint(local) else { continue };
        let Some((remote_addr, remote_port)) = split_hex_endpoint(remote) else { continue };
        let state = u32::from_str_radix(state_hex, 16)
            .ok()
            .map(linux_state_to_table)
            .unwrap_or(0);

        rows.push([state, local_addr, local_port, remote_addr, remote_port, 0]);
    }

    let mut buf = (rows.len() as u32).to_ne_bytes().to_vec();
    for row in rows {
        match protocol {
            Protocol::Tcp => {
                for value in row {
                    buf.extend_from_slice(&value.to_ne_bytes());
                }
            }
            Protocol::Udp => {
                // local addr, local port, owning pid
                buf.extend_from_slice(&row[1].to_ne_bytes());
                buf.extend_from_slice(&row[2].to_ne_bytes());
                buf.extend_from_slice(&row[5].to_ne_bytes());
            }
        }
    }
    buf
}

/// `0100007F:0050` → (addr dword in wire byte order, port dword with the
/// low word big-endian), matching the table layout.
fn split_hex_endpoint(endpoint: &str) -> Option<(u32, u32)> {
    let (addr_hex, port_hex) = endpoint.split_once(':')?;
    if addr_hex.len() != 8 {
        return None; // IPv6 rows are skipped
    }
    let addr_host = u32::from_str_radix(addr_hex, 16).ok()?;
    let addr_wire = u32::from_ne_bytes(addr_host.to_le_bytes());
    let port = u16::from_str_radix(port_hex, 16).ok()?;
    let port_wire = (((port & 0xFF) as u32) << 8) | ((port >> 8) as u32);
    Some((addr_wire, port_wire))
}

/// Linux socket states → extended-table state numbers.
fn linux_state_to_table(state: u32) -> u32 {
    match state {
        0x01 => 5,  // established
        0x02 => 3,  // syn sent
        0x03 => 4,  // syn received
        0x04 => 6,  // fin wait 1
        0x05 => 7,  // fin wait 2
        0x06 => 11, // time wait
        0x07 => 1,  // closed
        0x08 => 8,  // close wait
        0x09 => 10, // last ack
        0x0A => 2,  // listening
        0x0B => 9,  // closing
        _ => 0,
    }
}

/// Pid→name resolution via sysinfo. Table rows without an owning pid
/// resolve to the Unknown sentinel upstream.
pub struct SysinfoResolver {
    system: parking_lot::RwLock<sysinfo::System>,
}

impl SysinfoResolver {
    pub fn new() -> Self {
        Self {
            system: parking_lot::RwLock::new(sysinfo::System::new()),
        }
    }
}

impl ProcessNameResolver for SysinfoResolver {
    fn name_of(&self, pid: u32) -> Option<String> {
        if pid == 0 {
            return None;
        }
        let pid = sysinfo::Pid::from_u32(pid);
        let mut sys = self.system.write();
        sys.refresh_process(pid);
        sys.process(pid).map(|p| p.name().to_string())
    }
}

// ── device enumeration ──────────────────────────────────────────────

/// Walks the USB device tree under sysfs.
pub struct SysUsbEnumerator {
    root: std::path::PathBuf,
}

impl SysUsbEnumerator {
    pub fn new() -> Self {
        Self {
            root: "/sys/bus/usb/devices".into(),
        }
    }

    #[cfg(test)]
    pub fn with_root(root: impl Into<std::path::PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl DeviceEnumerator for SysUsbEnumerator {
    fn enumerate(&self) -> Vec<RawDeviceEntry> {
        let Ok(entries) = std::fs::read_dir(&self.root) else {
            return Vec::new();
        };
        let mut devices = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            let Some(vendor) = read_trimmed(&path.join("idVendor")) else {
                continue; // interface nodes carry no ids
            };
            let product_id = read_trimmed(&path.join("idProduct")).unwrap_or_default();
            let bus_id = entry.file_name().to_string_lossy().to_string();
            devices.push(RawDeviceEntry {
                device_id: format!(
                    "USB\\VID_{}&PID_{}\\{bus_id}",
                    vendor.to_uppercase(),
                    product_id.to_uppercase()
                ),
                name: read_trimmed(&path.join("product")).unwrap_or_else(|| "USB Device".into()),
                description: read_trimmed(&path.join("product")).unwrap_or_default(),
                manufacturer: read_trimmed(&path.join("manufacturer")).unwrap_or_default(),
                status: "OK".into(),
                class_guid: String::new(),
            });
        }
        devices
    }
}

fn read_trimmed(path: &Path) -> Option<String> {
    std::fs::read_to_string(path)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

// ── display probes ──────────────────────────────────────────────────

/// DRM connector walk under `/sys/class/drm`. The adapter-enumeration
/// probe has no sysfs equivalent and contributes nothing here; fusion
/// tolerates silent probes.
pub struct DrmProbeSource {
    root: std::path::PathBuf,
}

impl DrmProbeSource {
    pub fn new() -> Self {
        Self {
            root: "/sys/class/drm".into(),
        }
    }

    #[cfg(test)]
    pub fn with_root(root: impl Into<std::path::PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn connected_connectors(&self) -> Vec<(String, std::path::PathBuf)> {
        let Ok(entries) = std::fs::read_dir(&self.root) else {
            return Vec::new();
        };
        let mut connectors: Vec<(String, std::path::PathBuf)> = entries
            .flatten()
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().to_string();
                // connector dirs look like card0-HDMI-A-1
                if !name.contains('-') {
                    return None;
                }
                let path = entry.path();
                match read_trimmed(&path.join("status")).as_deref() {
                    Some("connected") => Some((name, path)),
                    _ => None,
                }
            })
            .collect();
        connectors.sort_by(|a, b| a.0.cmp(&b.0));
        connectors
    }
}

impl MonitorProbeSource for DrmProbeSource {
    fn coarse(&self) -> Vec<CoarseView> {
        self.connected_connectors()
            .into_iter()
            .map(|(name, path)| {
                let (width, height) = read_trimmed(&path.join("modes"))
                    .and_then(|modes| parse_mode(modes.lines().next().unwrap_or("")))
                    .unwrap_or((0, 0));
                CoarseView {
                    device_id: name.clone(),
                    name: format!("Display on {name}"),
                    screen_width: width,
                    screen_height: height,
                    ..Default::default()
                }
            })
            .collect()
    }

    fn adapters(&self) -> Vec<AdapterView> {
        Vec::new()
    }

    fn geometry(&self) -> Vec<GeometryView> {
        self.connected_connectors()
            .into_iter()
            .enumerate()
            .map(|(i, (_, path))| {
                let (width, height) = read_trimmed(&path.join("modes"))
                    .and_then(|modes| parse_mode(modes.lines().next().unwrap_or("")))
                    .unwrap_or((0, 0));
                GeometryView {
                    width,
                    height,
                    work_area_width: width,
                    work_area_height: height,
                    bits_per_pixel: 24,
                    is_primary: i == 0,
                }
            })
            .collect()
    }

    fn edid(&self) -> Vec<EdidView> {
        self.connected_connectors()
            .into_iter()
            .filter_map(|(name, path)| {
                let bytes = std::fs::read(path.join("edid")).ok()?;
                decode_edid(&name, &bytes)
            })
            .collect()
    }
}

fn parse_mode(mode: &str) -> Option<(u32, u32)> {
    let (w, h) = mode.split_once('x')?;
    Some((w.parse().ok()?, h.parse().ok()?))
}

/// Decode the identification fields of an EDID block: packed 3-letter
/// manufacturer id, product code, serial, week/year of manufacture.
pub fn decode_edid(instance_name: &str, bytes: &[u8]) -> Option<EdidView> {
    if bytes.len() < 18 {
        return None;
    }
    let packed = u16::from_be_bytes([bytes[8], bytes[9]]);
    let letters = [
        (packed >> 10) & 0x1F,
        (packed >> 5) & 0x1F,
        packed & 0x1F,
    ];
    if letters.iter().any(|&l| l == 0 || l > 26) {
        return None;
    }
    let manufacturer_code: String = letters
        .iter()
        .map(|&l| (b'A' + (l as u8) - 1) as char)
        .collect();

    let product = u16::from_le_bytes([bytes[10], bytes[11]]);
    let serial = u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]);
    let week = bytes[16] as u32;
    let year = 1990 + bytes[17] as u32;

    Some(EdidView {
        instance_name: instance_name.to_string(),
        manufacturer: arbiter_device::monitor_fuser::decode_vendor_code(&manufacturer_code),
        model: format!("{product:04X}"),
        serial_number: if serial == 0 {
            String::new()
        } else {
            serial.to_string()
        },
        year_of_manufacture: year,
        week_of_manufacture: if week == 0xFF { 0 } else { week },
    })
}

// ── screen capture ──────────────────────────────────────────────────

/// Placeholder capture backend for hosts without a framebuffer reader.
/// The delivery pipeline treats the error as a failed capture and moves
/// on; the Windows build substitutes a GDI-backed implementation.
pub struct UnsupportedCapture;

impl FrameCapture for UnsupportedCapture {
    fn capture(&self) -> AgentResult<Box<dyn FrameEncoder>> {
        Err(AgentError::Other(
            "no screen capture backend on this platform".into(),
        ))
    }
}
