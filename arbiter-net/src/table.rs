//! Extended connection-table acquisition and row decoding.
//!
//! The kernel exposes socket tables as a flat buffer: a leading 32-bit
//! entry count followed by fixed-size rows. Numeric fields are
//! host-endian except ports, which sit in the low 16 bits of their dword
//! in network byte order; IPv4 addresses are 32-bit values whose bytes
//! are already in wire order.
//!
//! Acquisition is the classic two-call dance: probe with an empty buffer
//! to learn the size, allocate, fetch. The table can grow between the
//! two calls, so a short buffer on the fetch is retried once with the
//! newly reported size before giving up.

use crate::types::{tcp_state_name, ConnectionRecord, Protocol};
use arbiter_core::{AgentError, AgentResult, UNKNOWN};
use std::net::Ipv4Addr;
use tracing::{debug, warn};

const COUNT_LEN: usize = 4;
/// state, local addr, local port, remote addr, remote port, owning pid
pub const TCP_ROW_LEN: usize = 24;
/// local addr, local port, owning pid
pub const UDP_ROW_LEN: usize = 12;

/// Source of raw table bytes — the OS call behind a seam.
///
/// `table_size` corresponds to the null-buffer size probe; `fill_table`
/// to the real fetch, which must fail with
/// [`AgentError::InsufficientBuffer`] when the table no longer fits.
pub trait ConnectionTableSource {
    fn table_size(&self, protocol: Protocol) -> AgentResult<usize>;
    fn fill_table(&self, protocol: Protocol, buf: &mut Vec<u8>) -> AgentResult<()>;
}

/// Best-effort owning-pid resolution. The pid may have exited between
/// the table fetch and the lookup; that is not an error.
pub trait ProcessNameResolver {
    fn name_of(&self, pid: u32) -> Option<String>;
}

/// Resolver for contexts where per-pid lookup is unavailable.
pub struct NoResolver;

impl ProcessNameResolver for NoResolver {
    fn name_of(&self, _pid: u32) -> Option<String> {
        None
    }
}

/// Fetch and decode both tables from `source`.
///
/// A failure on one protocol's table does not discard the other's rows.
pub fn fetch_connections(
    source: &dyn ConnectionTableSource,
    resolver: &dyn ProcessNameResolver,
) -> Vec<ConnectionRecord> {
    let mut records = Vec::new();
    for protocol in [Protocol::Tcp, Protocol::Udp] {
        match fetch_table(source, protocol) {
            Ok(buf) => match decode_table(protocol, &buf, resolver) {
                Ok(mut rows) => records.append(&mut rows),
                Err(e) => warn!(%protocol, error = %e, "connection table decode failed"),
            },
            Err(e) => warn!(%protocol, error = %e, "connection table fetch failed"),
        }
    }
    records
}

/// Size-probe, allocate, fetch — with one retry if the table grew
/// between the probe and the fetch.
fn fetch_table(source: &dyn ConnectionTableSource, protocol: Protocol) -> AgentResult<Vec<u8>> {
    let mut size = source.table_size(protocol)?;
    for attempt in 0..2 {
        let mut buf = vec![0u8; size];
        match source.fill_table(protocol, &mut buf) {
            Ok(()) => return Ok(buf),
            Err(AgentError::InsufficientBuffer { needed, have }) if attempt == 0 => {
                debug!(%protocol, needed, have, "connection table grew during fetch, retrying");
                size = needed;
            }
            Err(e) => return Err(e),
        }
    }
    Err(AgentError::Other(format!(
        "{protocol} table kept growing across retries"
    )))
}

/// Decode a raw table buffer into records.
pub fn decode_table(
    protocol: Protocol,
    buf: &[u8],
    resolver: &dyn ProcessNameResolver,
) -> AgentResult<Vec<ConnectionRecord>> {
    if buf.len() < COUNT_LEN {
        return Err(AgentError::TableTruncated {
            expected: 1,
            available: 0,
        });
    }
    let count = u32::from_ne_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    let row_len = match protocol {
        Protocol::Tcp => TCP_ROW_LEN,
        Protocol::Udp => UDP_ROW_LEN,
    };
    let available = (buf.len() - COUNT_LEN) / row_len;
    if available < count {
        return Err(AgentError::TableTruncated {
            expected: count,
            available,
        });
    }

    let mut records = Vec::with_capacity(count);
    for i in 0..count {
        let row = &buf[COUNT_LEN + i * row_len..COUNT_LEN + (i + 1) * row_len];
        let record = match protocol {
            Protocol::Tcp => decode_tcp_row(row, resolver),
            Protocol::Udp => decode_udp_row(row, resolver),
        };
        records.push(record);
    }
    Ok(records)
}

fn decode_tcp_row(row: &[u8], resolver: &dyn ProcessNameResolver) -> ConnectionRecord {
    let state = read_dword(row, 0);
    let local_addr = read_addr(row, 4);
    let local_port = read_port(row, 8);
    let remote_addr = read_addr(row, 12);
    let remote_port = read_port(row, 16);
    let pid = read_dword(row, 20);

    ConnectionRecord {
        local_address: local_addr.to_string(),
        local_port,
        remote_address: remote_addr.to_string(),
        remote_port,
        protocol: Protocol::Tcp,
        state: tcp_state_name(state).to_string(),
        process_id: pid,
        process_name: resolve_name(resolver, pid),
    }
}

fn decode_udp_row(row: &[u8], resolver: &dyn ProcessNameResolver) -> ConnectionRecord {
    let local_addr = read_addr(row, 0);
    let local_port = read_port(row, 4);
    let pid = read_dword(row, 8);

    ConnectionRecord {
        local_address: local_addr.to_string(),
        local_port,
        remote_address: Ipv4Addr::UNSPECIFIED.to_string(),
        remote_port: 0,
        protocol: Protocol::Udp,
        state: "Listening".to_string(),
        process_id: pid,
        process_name: resolve_name(resolver, pid),
    }
}

fn resolve_name(resolver: &dyn ProcessNameResolver, pid: u32) -> String {
    resolver.name_of(pid).unwrap_or_else(|| UNKNOWN.to_string())
}

fn read_dword(row: &[u8], offset: usize) -> u32 {
    u32::from_ne_bytes([row[offset], row[offset + 1], row[offset + 2], row[offset + 3]])
}

/// Address dwords carry their bytes in wire order already.
fn read_addr(row: &[u8], offset: usize) -> Ipv4Addr {
    Ipv4Addr::new(row[offset], row[offset + 1], row[offset + 2], row[offset + 3])
}

/// Ports sit in the low 16 bits of a dword, big-endian: swap the two
/// meaningful bytes.
fn read_port(row: &[u8], offset: usize) -> u16 {
    let raw = read_dword(row, offset);
    (((raw & 0xFF) << 8) | ((raw >> 8) & 0xFF)) as u16
}
