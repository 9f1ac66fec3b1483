#[cfg(test)]
mod tests {
    use crate::table::*;
    use crate::types::*;
    use arbiter_core::{AgentError, AgentResult};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MapResolver(HashMap<u32, String>);

    impl ProcessNameResolver for MapResolver {
        fn name_of(&self, pid: u32) -> Option<String> {
            self.0.get(&pid).cloned()
        }
    }

    fn tcp_row(state: u32, local: [u8; 4], lport: u16, remote: [u8; 4], rport: u16, pid: u32) -> Vec<u8> {
        let mut row = Vec::with_capacity(TCP_ROW_LEN);
        row.extend_from_slice(&state.to_ne_bytes());
        row.extend_from_slice(&local);
        row.extend_from_slice(&wire_port(lport).to_ne_bytes());
        row.extend_from_slice(&remote);
        row.extend_from_slice(&wire_port(rport).to_ne_bytes());
        row.extend_from_slice(&pid.to_ne_bytes());
        row
    }

    fn udp_row(local: [u8; 4], lport: u16, pid: u32) -> Vec<u8> {
        let mut row = Vec::with_capacity(UDP_ROW_LEN);
        row.extend_from_slice(&local);
        row.extend_from_slice(&wire_port(lport).to_ne_bytes());
        row.extend_from_slice(&pid.to_ne_bytes());
        row
    }

    /// Low 16 bits big-endian, the way the kernel table stores ports.
    fn wire_port(port: u16) -> u32 {
        (((port & 0xFF) as u32) << 8) | ((port >> 8) as u32)
    }

    fn table(count: u32, rows: &[Vec<u8>]) -> Vec<u8> {
        let mut buf = count.to_ne_bytes().to_vec();
        for row in rows {
            buf.extend_from_slice(row);
        }
        buf
    }

    #[test]
    fn test_tcp_table_yields_exactly_k_records() {
        let rows: Vec<Vec<u8>> = (0..5)
            .map(|i| tcp_row(5, [10, 0, 0, i as u8], 50000 + i, [1, 1, 1, 1], 443, 100 + i as u32))
            .collect();
        let buf = table(5, &rows);
        let records = decode_table(Protocol::Tcp, &buf, &NoResolver).unwrap();
        assert_eq!(records.len(), 5);
        assert!(records.iter().all(|r| r.protocol == Protocol::Tcp));
    }

    #[test]
    fn test_port_byte_swap() {
        // 443 stored as 0xBB01 in the dword's low word
        assert_eq!(wire_port(443), 0xBB01);
        let buf = table(1, &[tcp_row(5, [192, 168, 1, 10], 51000, [93, 184, 216, 34], 443, 4)]);
        let records = decode_table(Protocol::Tcp, &buf, &NoResolver).unwrap();
        assert_eq!(records[0].local_port, 51000);
        assert_eq!(records[0].remote_port, 443);
        assert_eq!(records[0].local_address, "192.168.1.10");
        assert_eq!(records[0].remote_address, "93.184.216.34");
        assert_eq!(records[0].state, "Established");
    }

    #[test]
    fn test_udp_rows_are_listening_with_zero_remote() {
        let buf = table(2, &[udp_row([0, 0, 0, 0], 53, 900), udp_row([127, 0, 0, 1], 5353, 901)]);
        let records = decode_table(Protocol::Udp, &buf, &NoResolver).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].state, "Listening");
        assert_eq!(records[0].remote_address, "0.0.0.0");
        assert_eq!(records[0].remote_port, 0);
        assert_eq!(records[1].local_port, 5353);
    }

    #[test]
    fn test_count_exceeding_buffer_is_truncation_error() {
        let buf = table(3, &[tcp_row(2, [0, 0, 0, 0], 80, [0, 0, 0, 0], 0, 1)]);
        match decode_table(Protocol::Tcp, &buf, &NoResolver) {
            Err(AgentError::TableTruncated { expected, available }) => {
                assert_eq!(expected, 3);
                assert_eq!(available, 1);
            }
            other => panic!("expected truncation error, got {other:?}"),
        }
    }

    #[test]
    fn test_pid_resolution_falls_back_to_unknown() {
        let mut names = HashMap::new();
        names.insert(4u32, "system_service".to_string());
        let resolver = MapResolver(names);
        let buf = table(
            2,
            &[
                tcp_row(5, [10, 0, 0, 1], 1000, [10, 0, 0, 2], 2000, 4),
                tcp_row(5, [10, 0, 0, 1], 1001, [10, 0, 0, 2], 2000, 9999),
            ],
        );
        let records = decode_table(Protocol::Tcp, &buf, &resolver).unwrap();
        assert_eq!(records[0].process_name, "system_service");
        assert_eq!(records[1].process_name, "Unknown");
    }

    /// Source that under-reports the size once, as when the table grows
    /// between the probe and the fetch.
    struct GrowingSource {
        fills: AtomicUsize,
        final_table: Vec<u8>,
    }

    impl ConnectionTableSource for GrowingSource {
        fn table_size(&self, protocol: Protocol) -> AgentResult<usize> {
            match protocol {
                Protocol::Tcp => Ok(self.final_table.len() - TCP_ROW_LEN),
                Protocol::Udp => Ok(4),
            }
        }

        fn fill_table(&self, protocol: Protocol, buf: &mut Vec<u8>) -> AgentResult<()> {
            if protocol == Protocol::Udp {
                buf[..4].copy_from_slice(&0u32.to_ne_bytes());
                return Ok(());
            }
            self.fills.fetch_add(1, Ordering::SeqCst);
            if buf.len() < self.final_table.len() {
                return Err(AgentError::InsufficientBuffer {
                    needed: self.final_table.len(),
                    have: buf.len(),
                });
            }
            buf[..self.final_table.len()].copy_from_slice(&self.final_table);
            Ok(())
        }
    }

    #[test]
    fn test_resize_race_retried_once() {
        let rows: Vec<Vec<u8>> = (0..3)
            .map(|i| tcp_row(5, [10, 0, 0, 1], 6000 + i, [10, 9, 8, 7], 443, i as u32))
            .collect();
        let source = GrowingSource {
            fills: AtomicUsize::new(0),
            final_table: table(3, &rows),
        };
        let records = fetch_connections(&source, &NoResolver);
        assert_eq!(source.fills.load(Ordering::SeqCst), 2);
        assert_eq!(records.len(), 3);
    }
}
