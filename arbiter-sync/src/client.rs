//! HTTP sync client.
//!
//! All public entry points are fail-soft: they return a boolean (or
//! best-effort `Option`) and never raise past the crate boundary. Local
//! validation of the subject/channel identifiers happens before any wire
//! call, so a misconfigured session costs zero network traffic.

use crate::types::{
    ClientDiagnostics, ConnectionState, ErrorReport, GameStatusRequest, ScreenshotCheckResponse,
    ScreenshotRequestDetails, ScreenshotUpload,
};
use arbiter_core::{AgentConfig, SessionContext};
use arbiter_inventory::Snapshot;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use reqwest::StatusCode;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub type StatusListener = Arc<dyn Fn(bool) + Send + Sync>;

/// Connection-state machine. A listener fires only when the probed
/// boolean differs from the previous state — repeated identical results
/// are silent.
pub struct ConnectionTracker {
    state: RwLock<ConnectionState>,
    last_error: RwLock<Option<String>>,
    listeners: Mutex<Vec<StatusListener>>,
    transitions: AtomicU64,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(ConnectionState::Disconnected),
            last_error: RwLock::new(None),
            listeners: Mutex::new(Vec::new()),
            transitions: AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self, listener: StatusListener) {
        self.listeners.lock().push(listener);
    }

    /// Mark a probe as started. Only visible while Disconnected; fires
    /// no listeners.
    pub fn begin_probe(&self) {
        let mut state = self.state.write();
        if *state == ConnectionState::Disconnected {
            *state = ConnectionState::Connecting;
        }
    }

    /// Record a probe outcome. Returns true when the state changed.
    pub fn observe(&self, connected: bool, error: Option<String>) -> bool {
        let changed = {
            let mut state = self.state.write();
            let was_connected = *state == ConnectionState::Connected;
            *state = if connected {
                ConnectionState::Connected
            } else {
                ConnectionState::Disconnected
            };
            was_connected != connected
        };
        *self.last_error.write() = error;
        if changed {
            self.transitions.fetch_add(1, Ordering::Relaxed);
            let listeners = self.listeners.lock();
            for listener in listeners.iter() {
                listener(connected);
            }
        }
        changed
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    pub fn is_connected(&self) -> bool {
        *self.state.read() == ConnectionState::Connected
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    pub fn transitions(&self) -> u64 {
        self.transitions.load(Ordering::Relaxed)
    }
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self::new()
    }
}

pub struct SyncClient {
    http: reqwest::Client,
    base_url: String,
    tracker: ConnectionTracker,
    retry_attempts: u32,
    upload_timeout: Duration,
    offline: bool,
    /// Requests actually put on the wire — stays 0 for local failures
    wire_calls: AtomicU64,
    send_failures: AtomicU64,
}

impl SyncClient {
    pub fn new(config: &AgentConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("arbiter/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("failed to build HTTP client");

        Self {
            http,
            base_url: config.server_base_url.trim_end_matches('/').to_string(),
            tracker: ConnectionTracker::new(),
            retry_attempts: config.retry_attempts.max(1),
            upload_timeout: Duration::from_secs(config.upload_timeout_secs()),
            offline: config.skip_server_verification,
            wire_calls: AtomicU64::new(0),
            send_failures: AtomicU64::new(0),
        }
    }

    pub fn tracker(&self) -> &ConnectionTracker {
        &self.tracker
    }

    pub fn is_connected(&self) -> bool {
        self.offline || self.tracker.is_connected()
    }

    /// Number of requests actually issued over the wire.
    pub fn wire_calls(&self) -> u64 {
        self.wire_calls.load(Ordering::Relaxed)
    }

    /// Probe `GET /health` up to the retry ceiling with ~1s pauses.
    /// Only the final failed attempt's error is recorded; the status
    /// listener fires only on an actual state change.
    pub async fn check_connection(&self) -> bool {
        if self.offline {
            self.tracker.observe(true, None);
            return true;
        }
        self.tracker.begin_probe();

        let mut last_error = None;
        let mut connected = false;
        for attempt in 1..=self.retry_attempts {
            self.wire_calls.fetch_add(1, Ordering::Relaxed);
            match self.http.get(format!("{}/health", self.base_url)).send().await {
                Ok(resp) if resp.status().is_success() => {
                    connected = true;
                    break;
                }
                Ok(resp) => {
                    last_error = Some(format!("health probe returned {}", resp.status()));
                }
                Err(e) => {
                    last_error = Some(format!("health probe failed: {e}"));
                }
            }
            if attempt < self.retry_attempts {
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }

        if connected {
            self.tracker.observe(true, None);
        } else {
            if let Some(ref err) = last_error {
                warn!(error = %err, "server unreachable after {} attempts", self.retry_attempts);
            }
            self.tracker.observe(false, last_error);
        }
        connected
    }

    /// Deliver one telemetry snapshot. Validation failures are local:
    /// they return false without touching the network.
    pub async fn send_snapshot(&self, snapshot: &Snapshot) -> bool {
        if snapshot.subject_id.is_empty() || snapshot.channel_id <= 0 {
            warn!("snapshot rejected locally: subject id and channel id are mandatory");
            return false;
        }
        if self.offline {
            return true;
        }

        self.wire_calls.fetch_add(1, Ordering::Relaxed);
        match self
            .http
            .post(format!("{}/monitor", self.base_url))
            .json(snapshot)
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => {
                debug!(processes = snapshot.processes.len(), "snapshot delivered");
                true
            }
            Ok(resp) => {
                self.note_rejection("snapshot", resp.status());
                false
            }
            Err(e) => {
                self.send_failures.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "snapshot send failed");
                false
            }
        }
    }

    pub async fn send_game_state(&self, session: &SessionContext, is_running: bool) -> bool {
        if !session.is_complete() {
            warn!("game-state rejected locally: incomplete session identifiers");
            return false;
        }
        if self.offline {
            return true;
        }
        let body = GameStatusRequest {
            subject_id: session.subject_id.clone(),
            channel_id: session.channel_id,
            is_game_running: is_running,
        };
        self.post_fail_soft("game-status", &body).await
    }

    pub async fn report_error(&self, message: &str) -> bool {
        if self.offline {
            return true;
        }
        let body = ErrorReport {
            error: message.to_string(),
            timestamp: Utc::now(),
        };
        self.post_fail_soft("error", &body).await
    }

    /// Upload an encoded screenshot. Uses the doubled image timeout.
    pub async fn send_screenshot(&self, upload: &ScreenshotUpload) -> bool {
        if upload.subject_id.is_empty() || upload.channel_id <= 0 || upload.screenshot.is_empty() {
            warn!("screenshot rejected locally: subject, channel and image are mandatory");
            return false;
        }
        if self.offline {
            return true;
        }
        self.wire_calls.fetch_add(1, Ordering::Relaxed);
        match self
            .http
            .post(format!("{}/screenshot", self.base_url))
            .timeout(self.upload_timeout)
            .json(upload)
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                self.note_rejection("screenshot", resp.status());
                false
            }
            Err(e) => {
                self.send_failures.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "screenshot send failed");
                false
            }
        }
    }

    /// Poll for a pending screenshot request. `None` means no request —
    /// or any failure; the poller just tries again next tick.
    pub async fn check_screenshot_request(
        &self,
        session: &SessionContext,
    ) -> Option<ScreenshotRequestDetails> {
        if !session.is_complete() || self.offline {
            return None;
        }
        self.wire_calls.fetch_add(1, Ordering::Relaxed);
        let url = format!(
            "{}/screenshots/check-requests?subjectId={}&channelId={}",
            self.base_url, session.subject_id, session.channel_id
        );
        match self.http.get(url).send().await {
            Ok(resp) if resp.status().is_success() => {
                match resp.json::<ScreenshotCheckResponse>().await {
                    Ok(check) if check.has_request => {
                        let details = check.request_details.unwrap_or(ScreenshotRequestDetails {
                            requested_by: "server".to_string(),
                            timestamp: String::new(),
                            source: "user".to_string(),
                        });
                        info!(requested_by = %details.requested_by, source = %details.source,
                            "screenshot requested via poll");
                        Some(details)
                    }
                    Ok(_) => None,
                    Err(e) => {
                        debug!(error = %e, "screenshot-request poll returned malformed body");
                        None
                    }
                }
            }
            Ok(resp) => {
                self.note_rejection("screenshot-request poll", resp.status());
                None
            }
            Err(e) => {
                debug!(error = %e, "screenshot-request poll failed");
                None
            }
        }
    }

    pub fn diagnostics(&self) -> ClientDiagnostics {
        ClientDiagnostics {
            state: self.tracker.state(),
            last_error: self.tracker.last_error(),
            server_url: self.base_url.clone(),
        }
    }

    async fn post_fail_soft<T: serde::Serialize>(&self, endpoint: &str, body: &T) -> bool {
        self.wire_calls.fetch_add(1, Ordering::Relaxed);
        match self
            .http
            .post(format!("{}/{endpoint}", self.base_url))
            .json(body)
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                self.note_rejection(endpoint, resp.status());
                false
            }
            Err(e) => {
                self.send_failures.fetch_add(1, Ordering::Relaxed);
                warn!(endpoint, error = %e, "send failed");
                false
            }
        }
    }

    fn note_rejection(&self, what: &str, status: StatusCode) {
        self.send_failures.fetch_add(1, Ordering::Relaxed);
        warn!(%status, hint = rejection_hint(status), "{what} rejected by server");
    }
}

/// Diagnostic text for a server rejection. Purely informational — the
/// status does not change retry behavior within a call.
pub fn rejection_hint(status: StatusCode) -> &'static str {
    match status.as_u16() {
        401 | 403 | 407 => "check authorization credentials",
        404 => "endpoint not found; server URL may be misconfigured",
        500..=599 => "server-side failure; will retry on the next cycle",
        _ => "request rejected",
    }
}
