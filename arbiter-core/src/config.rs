//! Agent configuration, loaded from the environment.
//!
//! Every knob has a default suitable for a production tournament host;
//! `ARBITER_*` environment variables override individual fields. There is
//! deliberately no CLI surface — the agent is launched by an installer
//! wrapper that only speaks environment variables.

use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Base URL of the compliance API, e.g. `https://host/api`
    pub server_base_url: String,
    /// Telemetry snapshot send interval in seconds
    pub monitor_interval_secs: u64,
    /// Device reconciliation fallback scan interval in seconds
    pub device_scan_interval_secs: u64,
    /// Connection health probe interval in seconds
    pub connection_check_interval_secs: u64,
    /// Screenshot request poll interval in seconds
    pub screenshot_poll_interval_secs: u64,
    /// Hard cap on an encoded screenshot, in bytes
    pub max_image_bytes: usize,
    /// Per-request timeout in seconds (doubled for image uploads)
    pub request_timeout_secs: u64,
    /// Attempt ceiling for connection probes and screenshot delivery
    pub retry_attempts: u32,
    /// Directory for screenshots that could not be delivered
    pub fallback_dir: String,
    /// Process names that count as "the game is running"
    pub game_process_names: Vec<String>,
    /// Emit debug-level diagnostics
    pub verbose_diagnostics: bool,
    /// Run fully offline: all wire calls short-circuit to success
    pub skip_server_verification: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            server_base_url: "https://compliance.example.net/api".into(),
            monitor_interval_secs: 30,
            device_scan_interval_secs: 5,
            connection_check_interval_secs: 15,
            screenshot_poll_interval_secs: 7,
            max_image_bytes: 5 * 1024 * 1024,
            request_timeout_secs: 8,
            retry_attempts: 3,
            fallback_dir: "pending_screenshots".into(),
            game_process_names: vec![
                "ModernWarfare".into(),
                "BlackOpsColdWar".into(),
                "Warzone".into(),
                "Vanguard".into(),
                "MW2".into(),
            ],
            verbose_diagnostics: false,
            skip_server_verification: false,
        }
    }
}

impl AgentConfig {
    /// Build a config from defaults plus `ARBITER_*` environment overrides.
    ///
    /// Unparseable numeric values are logged and ignored rather than
    /// failing startup; the agent must come up with whatever is valid.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(url) = std::env::var("ARBITER_SERVER_URL") {
            if !url.is_empty() {
                cfg.server_base_url = url.trim_end_matches('/').to_string();
            }
        }
        read_u64("ARBITER_MONITOR_INTERVAL_SECS", &mut cfg.monitor_interval_secs);
        read_u64("ARBITER_DEVICE_SCAN_INTERVAL_SECS", &mut cfg.device_scan_interval_secs);
        read_u64("ARBITER_CONNECTION_CHECK_INTERVAL_SECS", &mut cfg.connection_check_interval_secs);
        read_u64("ARBITER_SCREENSHOT_POLL_INTERVAL_SECS", &mut cfg.screenshot_poll_interval_secs);
        read_u64("ARBITER_REQUEST_TIMEOUT_SECS", &mut cfg.request_timeout_secs);

        if let Ok(raw) = std::env::var("ARBITER_MAX_IMAGE_BYTES") {
            match raw.parse() {
                Ok(v) => cfg.max_image_bytes = v,
                Err(_) => warn!(value = %raw, "ignoring unparseable ARBITER_MAX_IMAGE_BYTES"),
            }
        }
        if let Ok(raw) = std::env::var("ARBITER_RETRY_ATTEMPTS") {
            match raw.parse::<u32>() {
                Ok(v) if v > 0 => cfg.retry_attempts = v,
                _ => warn!(value = %raw, "ignoring invalid ARBITER_RETRY_ATTEMPTS"),
            }
        }
        if let Ok(dir) = std::env::var("ARBITER_FALLBACK_DIR") {
            if !dir.is_empty() {
                cfg.fallback_dir = dir;
            }
        }
        if let Ok(names) = std::env::var("ARBITER_GAME_PROCESSES") {
            let parsed: Vec<String> = names
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if !parsed.is_empty() {
                cfg.game_process_names = parsed;
            }
        }
        cfg.verbose_diagnostics = flag_set("ARBITER_VERBOSE");
        cfg.skip_server_verification = flag_set("ARBITER_OFFLINE");

        cfg
    }

    /// Timeout for image uploads: double the standard request timeout.
    pub fn upload_timeout_secs(&self) -> u64 {
        self.request_timeout_secs * 2
    }
}

fn read_u64(var: &str, target: &mut u64) {
    if let Ok(raw) = std::env::var(var) {
        match raw.parse::<u64>() {
            Ok(v) if v > 0 => *target = v,
            _ => warn!(var, value = %raw, "ignoring invalid interval override"),
        }
    }
}

fn flag_set(var: &str) -> bool {
    matches!(
        std::env::var(var).as_deref(),
        Ok("1") | Ok("true") | Ok("yes")
    )
}
