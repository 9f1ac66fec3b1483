//! Snapshot assembly.
//!
//! One [`Snapshot`] is the complete point-in-time report delivered to
//! the compliance server. It is immutable once built; exactly one is in
//! flight per send cycle.

use crate::types::{DriverRecord, HardwareSummary, ProcessRecord, SystemFacts};
use arbiter_core::SessionContext;
use arbiter_device::DeviceRecord;
use arbiter_net::ConnectionRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub subject_id: String,
    pub channel_id: i64,
    pub timestamp: DateTime<Utc>,
    pub client_start_time: DateTime<Utc>,
    pub pc_start_time: String,
    pub is_game_running: bool,
    pub processes: Vec<ProcessRecord>,
    pub usb_devices: Vec<DeviceRecord>,
    pub hardware_info: HardwareSummary,
    pub system_info: SystemFacts,
    pub network_connections: Vec<ConnectionRecord>,
    pub loaded_drivers: Vec<DriverRecord>,
}

/// Accumulates collected parts, then stamps identity and time.
pub struct SnapshotBuilder {
    session: SessionContext,
    pc_start_time: String,
    is_game_running: bool,
    processes: Vec<ProcessRecord>,
    devices: Vec<DeviceRecord>,
    hardware: HardwareSummary,
    system: SystemFacts,
    connections: Vec<ConnectionRecord>,
    drivers: Vec<DriverRecord>,
}

impl SnapshotBuilder {
    pub fn new(session: SessionContext) -> Self {
        Self {
            session,
            pc_start_time: String::new(),
            is_game_running: false,
            processes: Vec::new(),
            devices: Vec::new(),
            hardware: HardwareSummary::default(),
            system: SystemFacts::default(),
            connections: Vec::new(),
            drivers: Vec::new(),
        }
    }

    pub fn pc_start_time(mut self, boot_time: impl Into<String>) -> Self {
        self.pc_start_time = boot_time.into();
        self
    }

    pub fn game_running(mut self, running: bool) -> Self {
        self.is_game_running = running;
        self
    }

    pub fn processes(mut self, processes: Vec<ProcessRecord>) -> Self {
        self.processes = processes;
        self
    }

    /// The reconciler's current set plus the fused monitors.
    pub fn devices(mut self, devices: Vec<DeviceRecord>) -> Self {
        self.devices = devices;
        self
    }

    pub fn hardware(mut self, hardware: HardwareSummary) -> Self {
        self.hardware = hardware;
        self
    }

    pub fn system(mut self, system: SystemFacts) -> Self {
        self.system = system;
        self
    }

    pub fn connections(mut self, connections: Vec<ConnectionRecord>) -> Self {
        self.connections = connections;
        self
    }

    pub fn drivers(mut self, drivers: Vec<DriverRecord>) -> Self {
        self.drivers = drivers;
        self
    }

    pub fn build(self) -> Snapshot {
        Snapshot {
            subject_id: self.session.subject_id.clone(),
            channel_id: self.session.channel_id,
            timestamp: Utc::now(),
            client_start_time: self.session.client_start_time,
            pc_start_time: self.pc_start_time,
            is_game_running: self.is_game_running,
            processes: self.processes,
            usb_devices: self.devices,
            hardware_info: self.hardware,
            system_info: self.system,
            network_connections: self.connections,
            loaded_drivers: self.drivers,
        }
    }
}
