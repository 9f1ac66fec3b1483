//! Running-process enumeration with best-effort enrichment.
//!
//! Every process yields a record: pid and name always resolve; path,
//! hash, version metadata, command line, memory and start time each
//! default to a sentinel on failure instead of aborting the enumeration.

use crate::types::ProcessRecord;
use arbiter_core::NOT_AVAILABLE;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use sysinfo::System;
use tracing::debug;

/// Embedded version/publisher metadata for a binary on disk.
#[derive(Debug, Clone, Default)]
pub struct BinaryMetadata {
    pub file_version: String,
    pub publisher: String,
}

/// OS seam for reading a binary's embedded version resource. Returns
/// `None` when the format has no such resource or the read fails.
pub trait BinaryMetadataSource: Send + Sync {
    fn version_info(&self, path: &Path) -> Option<BinaryMetadata>;
}

/// Metadata source for platforms without version resources.
pub struct NoMetadata;

impl BinaryMetadataSource for NoMetadata {
    fn version_info(&self, _path: &Path) -> Option<BinaryMetadata> {
        None
    }
}

pub struct ProcessInventory {
    system: RwLock<System>,
    metadata: Box<dyn BinaryMetadataSource>,
    game_process_names: Vec<String>,
    scans_completed: AtomicU64,
    hash_failures: AtomicU64,
}

impl ProcessInventory {
    pub fn new(game_process_names: Vec<String>, metadata: Box<dyn BinaryMetadataSource>) -> Self {
        Self {
            system: RwLock::new(System::new_all()),
            metadata,
            game_process_names,
            scans_completed: AtomicU64::new(0),
            hash_failures: AtomicU64::new(0),
        }
    }

    /// Enumerate all running processes. Never fails as a whole: a process
    /// that resists inspection still produces a minimal record.
    pub fn collect(&self) -> Vec<ProcessRecord> {
        let mut sys = self.system.write();
        sys.refresh_processes();
        self.scans_completed.fetch_add(1, Ordering::Relaxed);

        let mut records = Vec::with_capacity(sys.processes().len());
        for (pid, process) in sys.processes() {
            let mut record = ProcessRecord {
                name: process.name().to_string(),
                pid: pid.as_u32() as i32,
                file_path: NOT_AVAILABLE.to_string(),
                file_hash: NOT_AVAILABLE.to_string(),
                command_line: NOT_AVAILABLE.to_string(),
                file_version: NOT_AVAILABLE.to_string(),
                is_signed: false,
                signature_info: String::new(),
                memory_usage: process.memory(),
                start_time: format_start_time(process.start_time()),
            };
            if record.name.is_empty() {
                record.name = format!("Process {}", record.pid);
            }

            // Path fails silently for protected/system processes
            if let Some(exe) = process.exe() {
                record.file_path = exe.display().to_string();
                record.file_hash = match hash_file(exe) {
                    Ok(hash) => hash,
                    Err(e) => {
                        self.hash_failures.fetch_add(1, Ordering::Relaxed);
                        debug!(path = %exe.display(), error = %e, "binary hash failed");
                        NOT_AVAILABLE.to_string()
                    }
                };
                if let Some(meta) = self.metadata.version_info(exe) {
                    record.file_version = if meta.file_version.is_empty() {
                        NOT_AVAILABLE.to_string()
                    } else {
                        meta.file_version
                    };
                    record.is_signed = !meta.publisher.is_empty();
                    record.signature_info = meta.publisher;
                }
            }

            // Optional enrichment: a failed lookup must not drop the record
            let cmd = process.cmd();
            if !cmd.is_empty() {
                record.command_line = cmd.join(" ");
            }

            records.push(record);
        }

        debug!(processes = records.len(), "process inventory collected");
        records
    }

    /// Case-insensitive substring match of running process names against
    /// the configured game list.
    pub fn is_game_running(&self) -> bool {
        let sys = self.system.read();
        sys.processes()
            .values()
            .any(|p| matches_game_list(p.name(), &self.game_process_names))
    }

    pub fn scans_completed(&self) -> u64 {
        self.scans_completed.load(Ordering::Relaxed)
    }

    pub fn hash_failures(&self) -> u64 {
        self.hash_failures.load(Ordering::Relaxed)
    }
}

/// Streaming SHA-256 over a shared-read handle, so a locked running
/// binary can still be hashed.
pub fn hash_file(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:X}", hasher.finalize()))
}

/// Check whether any name in `names` matches a game process name.
pub fn matches_game_list(process_name: &str, game_names: &[String]) -> bool {
    let name = process_name.to_lowercase();
    game_names.iter().any(|g| name.contains(&g.to_lowercase()))
}

fn format_start_time(epoch_secs: u64) -> String {
    let ts = if epoch_secs == 0 {
        Utc::now()
    } else {
        DateTime::<Utc>::from_timestamp(epoch_secs as i64, 0).unwrap_or_else(Utc::now)
    };
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}
