//! Shared types for connection-table decoding.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "TCP"),
            Protocol::Udp => write!(f, "UDP"),
        }
    }
}

/// One decoded socket-table row. Rebuilt on every snapshot, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRecord {
    pub local_address: String,
    pub local_port: u16,
    pub remote_address: String,
    pub remote_port: u16,
    pub protocol: Protocol,
    pub state: String,
    pub process_id: u32,
    pub process_name: String,
}

/// Human-readable name for a numeric TCP state from the kernel table.
pub fn tcp_state_name(state: u32) -> &'static str {
    match state {
        1 => "Closed",
        2 => "Listening",
        3 => "SYN Sent",
        4 => "SYN Received",
        5 => "Established",
        6 => "FIN Wait 1",
        7 => "FIN Wait 2",
        8 => "Close Wait",
        9 => "Closing",
        10 => "Last ACK",
        11 => "Time Wait",
        12 => "Delete TCB",
        _ => "Unknown",
    }
}
