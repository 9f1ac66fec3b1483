//! Loaded-driver inventory.
//!
//! The enumeration source is a seam: on Linux hosts the default source
//! parses `/proc/modules`; the Windows service-table source plugs in the
//! same way. Signature status reuses the publisher-metadata
//! approximation from the process inventory.

use crate::processes::BinaryMetadataSource;
use crate::types::DriverRecord;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Raw identity of one loaded driver before enrichment.
#[derive(Debug, Clone, Default)]
pub struct RawDriverEntry {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub path_name: String,
    pub start_type: String,
    pub state: String,
}

pub trait DriverEnumerator: Send + Sync {
    fn enumerate(&self) -> Vec<RawDriverEntry>;
}

/// Reads the kernel's loaded-module table on Linux.
pub struct ProcModulesEnumerator;

impl DriverEnumerator for ProcModulesEnumerator {
    fn enumerate(&self) -> Vec<RawDriverEntry> {
        match std::fs::read_to_string("/proc/modules") {
            Ok(contents) => parse_proc_modules(&contents),
            Err(_) => Vec::new(),
        }
    }
}

/// Each `/proc/modules` line: `name size refcount deps state address`.
pub fn parse_proc_modules(contents: &str) -> Vec<RawDriverEntry> {
    contents
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let name = fields.next()?.to_string();
            let _size = fields.next();
            let _refs = fields.next();
            let _deps = fields.next();
            let state = fields.next().unwrap_or("Live").to_string();
            Some(RawDriverEntry {
                path_name: format!("/lib/modules/{name}.ko"),
                display_name: name.clone(),
                name,
                description: String::new(),
                start_type: "Boot".to_string(),
                state,
            })
        })
        .collect()
}

pub struct DriverInventory {
    enumerator: Box<dyn DriverEnumerator>,
    metadata: Box<dyn BinaryMetadataSource>,
    scans_completed: AtomicU64,
}

impl DriverInventory {
    pub fn new(
        enumerator: Box<dyn DriverEnumerator>,
        metadata: Box<dyn BinaryMetadataSource>,
    ) -> Self {
        Self {
            enumerator,
            metadata,
            scans_completed: AtomicU64::new(0),
        }
    }

    pub fn collect(&self) -> Vec<DriverRecord> {
        self.scans_completed.fetch_add(1, Ordering::Relaxed);
        let entries = self.enumerator.enumerate();
        let records: Vec<DriverRecord> = entries
            .into_iter()
            .map(|entry| {
                let is_signed = !entry.path_name.is_empty()
                    && self
                        .metadata
                        .version_info(Path::new(&entry.path_name))
                        .map(|m| !m.publisher.is_empty())
                        .unwrap_or(false);
                DriverRecord {
                    name: entry.name,
                    display_name: entry.display_name,
                    description: entry.description,
                    path_name: entry.path_name,
                    start_type: entry.start_type,
                    state: entry.state,
                    is_signed,
                }
            })
            .collect();
        debug!(drivers = records.len(), "driver inventory collected");
        records
    }

    pub fn scans_completed(&self) -> u64 {
        self.scans_completed.load(Ordering::Relaxed)
    }
}
