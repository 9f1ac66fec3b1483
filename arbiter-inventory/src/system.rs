//! Host system facts.

use crate::types::SystemFacts;
use arbiter_core::UNKNOWN;
use chrono::{DateTime, Local, Utc};
use sysinfo::System;

pub fn collect(primary_resolution: Option<String>) -> SystemFacts {
    let os_version = match (System::long_os_version(), System::os_version()) {
        (Some(long), Some(version)) if !long.contains(&version) => format!("{long} {version}"),
        (Some(long), _) => long,
        (None, Some(version)) => version,
        (None, None) => UNKNOWN.to_string(),
    };

    SystemFacts {
        os_version,
        computer_name: System::host_name().unwrap_or_else(|| UNKNOWN.to_string()),
        username: std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| UNKNOWN.to_string()),
        screen_resolution: primary_resolution.unwrap_or_else(|| UNKNOWN.to_string()),
        last_boot_time: boot_time_string(),
        time_zone: Local::now().offset().to_string(),
        agent_version: env!("CARGO_PKG_VERSION").to_string(),
    }
}

/// Host boot time, formatted like the rest of the wire timestamps.
pub fn boot_time_string() -> String {
    let secs = System::boot_time();
    match DateTime::<Utc>::from_timestamp(secs as i64, 0) {
        Some(ts) if secs > 0 => ts.format("%Y-%m-%d %H:%M:%S").to_string(),
        _ => UNKNOWN.to_string(),
    }
}
