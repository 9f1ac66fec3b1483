//! Authoritative attached-device set.
//!
//! Two independent triggers feed the same set: OS push notifications
//! (fast path) and the periodic full catalog scan (missed-notification
//! recovery). Both funnel through one lock so a scan diff and a
//! notification can never interleave into a corrupt set, and each
//! physical transition produces at most one attach and one detach event.

use crate::types::{DeviceChange, DeviceRecord};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

pub type ChangeListener = Arc<dyn Fn(&DeviceChange) + Send + Sync>;

pub struct DeviceReconciler {
    /// deviceId → record; the single source of truth for "currently attached"
    attached: Mutex<HashMap<String, DeviceRecord>>,
    listeners: Mutex<Vec<ChangeListener>>,
    total_attaches: AtomicU64,
    total_detaches: AtomicU64,
    suppressed_duplicates: AtomicU64,
}

impl DeviceReconciler {
    pub fn new() -> Self {
        Self {
            attached: Mutex::new(HashMap::new()),
            listeners: Mutex::new(Vec::new()),
            total_attaches: AtomicU64::new(0),
            total_detaches: AtomicU64::new(0),
            suppressed_duplicates: AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self, listener: ChangeListener) {
        self.listeners.lock().push(listener);
    }

    /// Seed the set from one full scan at startup. Fires no events — the
    /// initial population is not a transition.
    pub fn initialize(&self, scan: Vec<DeviceRecord>) {
        let mut attached = self.attached.lock();
        attached.clear();
        for record in scan {
            attached.insert(record.device_id.clone(), record);
        }
        info!(devices = attached.len(), "device set initialized");
    }

    /// Push-notification insert. A duplicate for an already-present id
    /// is suppressed without an event.
    pub fn observe_attached(&self, record: DeviceRecord) -> Option<DeviceChange> {
        let change = {
            let mut attached = self.attached.lock();
            if attached.contains_key(&record.device_id) {
                self.suppressed_duplicates.fetch_add(1, Ordering::Relaxed);
                return None;
            }
            attached.insert(record.device_id.clone(), record.clone());
            self.attach_change(record)
        };
        self.emit(&change);
        Some(change)
    }

    /// Push-notification removal. An id we never saw attach still yields
    /// a detach event with a minimal record.
    pub fn observe_detached(&self, device_id: &str, name: &str) -> DeviceChange {
        let change = {
            let mut attached = self.attached.lock();
            let record = attached
                .remove(device_id)
                .unwrap_or_else(|| DeviceRecord::minimal(device_id, name));
            self.detach_change(record)
        };
        self.emit(&change);
        change
    }

    /// Full-scan diff: the periodic fallback path. Devices in the scan
    /// but not the set attach; devices in the set but not the scan
    /// detach. Read-diff-write happens under one lock acquisition.
    pub fn reconcile(&self, scan: Vec<DeviceRecord>) -> Vec<DeviceChange> {
        let mut changes = Vec::new();
        {
            let mut attached = self.attached.lock();
            let scanned_ids: HashMap<&str, ()> =
                scan.iter().map(|r| (r.device_id.as_str(), ())).collect();

            let removed: Vec<String> = attached
                .keys()
                .filter(|id| !scanned_ids.contains_key(id.as_str()))
                .cloned()
                .collect();
            for id in removed {
                if let Some(record) = attached.remove(&id) {
                    changes.push(self.detach_change(record));
                }
            }

            for record in scan {
                if !attached.contains_key(&record.device_id) {
                    attached.insert(record.device_id.clone(), record.clone());
                    changes.push(self.attach_change(record));
                } else {
                    // Re-observation refreshes descriptive fields in place
                    attached.insert(record.device_id.clone(), record);
                }
            }
        }
        if !changes.is_empty() {
            debug!(changes = changes.len(), "scan reconciliation produced transitions");
        }
        for change in &changes {
            self.emit(change);
        }
        changes
    }

    /// Snapshot of the current attached set.
    pub fn current(&self) -> Vec<DeviceRecord> {
        self.attached.lock().values().cloned().collect()
    }

    pub fn attached_count(&self) -> usize {
        self.attached.lock().len()
    }

    pub fn total_attaches(&self) -> u64 {
        self.total_attaches.load(Ordering::Relaxed)
    }

    pub fn total_detaches(&self) -> u64 {
        self.total_detaches.load(Ordering::Relaxed)
    }

    pub fn suppressed_duplicates(&self) -> u64 {
        self.suppressed_duplicates.load(Ordering::Relaxed)
    }

    fn attach_change(&self, device: DeviceRecord) -> DeviceChange {
        self.total_attaches.fetch_add(1, Ordering::Relaxed);
        DeviceChange {
            device,
            attached: true,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }

    fn detach_change(&self, device: DeviceRecord) -> DeviceChange {
        self.total_detaches.fetch_add(1, Ordering::Relaxed);
        DeviceChange {
            device,
            attached: false,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }

    fn emit(&self, change: &DeviceChange) {
        let listeners = self.listeners.lock();
        for listener in listeners.iter() {
            listener(change);
        }
    }
}

impl Default for DeviceReconciler {
    fn default() -> Self {
        Self::new()
    }
}
