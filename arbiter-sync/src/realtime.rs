//! Realtime command channel.
//!
//! The server pushes commands over a Socket.IO-style event stream: text
//! frames prefixed `42` carrying a `[eventName, payload]` JSON array.
//! The framing is treated as opaque beyond that — the only command the
//! agent acts on is `take-screenshot`, and only when it names the
//! locally active subject.

use arbiter_core::{AgentError, AgentResult, SessionContext};
use futures_util::StreamExt;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

/// Socket.IO event-frame prefix for a named event.
const EVENT_PREFIX: &str = "42";
/// The one command the agent acts on.
const TAKE_SCREENSHOT: &str = "take-screenshot";

/// A decoded screenshot command from the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenshotCommand {
    pub subject_id: String,
    pub requested_by: String,
}

pub type CommandListener = Arc<dyn Fn(ScreenshotCommand) + Send + Sync>;
pub type ChannelStatusListener = Arc<dyn Fn(bool) + Send + Sync>;

/// Derive the event-stream URL from the HTTP base URL: drop a trailing
/// `/api`, swap the scheme, append the stream path.
pub fn websocket_url(base_url: &str) -> String {
    let mut url = base_url.trim_end_matches('/').to_string();
    if let Some(stripped) = url.strip_suffix("/api") {
        url = stripped.to_string();
    }
    url = url
        .replacen("https://", "wss://", 1)
        .replacen("http://", "ws://", 1);
    format!("{url}/socket.io/?EIO=3&transport=websocket")
}

/// Decode one text frame into a named event and its payload. Frames
/// without the event prefix (heartbeats, acks) decode to `None`.
pub fn decode_event(frame: &str) -> Option<(String, Value)> {
    let body = frame.strip_prefix(EVENT_PREFIX)?;
    let parsed: Value = serde_json::from_str(body).ok()?;
    let array = parsed.as_array()?;
    let name = array.first()?.as_str()?.to_string();
    let payload = array.get(1).cloned().unwrap_or(Value::Null);
    Some((name, payload))
}

/// Extract the screenshot command fields from an event payload.
pub fn parse_screenshot_command(payload: &Value) -> Option<ScreenshotCommand> {
    let subject_id = payload.get("subjectId")?.as_str()?.to_string();
    if subject_id.is_empty() {
        return None;
    }
    let requested_by = payload
        .get("requestedBy")
        .and_then(|v| v.as_str())
        .unwrap_or("judge")
        .to_string();
    Some(ScreenshotCommand {
        subject_id,
        requested_by,
    })
}

pub struct RealtimeChannel {
    url: String,
    session: SessionContext,
    command_listeners: parking_lot::Mutex<Vec<CommandListener>>,
    status_listeners: parking_lot::Mutex<Vec<ChannelStatusListener>>,
    running: AtomicBool,
    events_received: AtomicU64,
    commands_accepted: AtomicU64,
    commands_ignored: AtomicU64,
}

impl RealtimeChannel {
    pub fn new(base_url: &str, session: SessionContext) -> Self {
        Self {
            url: websocket_url(base_url),
            session,
            command_listeners: parking_lot::Mutex::new(Vec::new()),
            status_listeners: parking_lot::Mutex::new(Vec::new()),
            running: AtomicBool::new(false),
            events_received: AtomicU64::new(0),
            commands_accepted: AtomicU64::new(0),
            commands_ignored: AtomicU64::new(0),
        }
    }

    pub fn on_command(&self, listener: CommandListener) {
        self.command_listeners.lock().push(listener);
    }

    pub fn on_status(&self, listener: ChannelStatusListener) {
        self.status_listeners.lock().push(listener);
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }

    /// Connect and pump frames until the stream closes or `stop` is
    /// called. Reconnection policy belongs to the caller's loop.
    pub async fn run(&self) -> AgentResult<()> {
        info!(url = %self.url, "connecting realtime channel");
        let (stream, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| AgentError::Realtime(e.to_string()))?;
        self.running.store(true, Ordering::Relaxed);
        self.emit_status(true);

        let (_write, mut read) = stream.split();
        while self.running.load(Ordering::Relaxed) {
            match read.next().await {
                Some(Ok(Message::Text(text))) => {
                    self.handle_frame(&text);
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "realtime channel read error");
                    break;
                }
            }
        }

        self.running.store(false, Ordering::Relaxed);
        self.emit_status(false);
        Ok(())
    }

    /// Decode one frame and dispatch a matching command. Commands for a
    /// different subject are ignored.
    pub fn handle_frame(&self, frame: &str) -> Option<ScreenshotCommand> {
        let (name, payload) = decode_event(frame)?;
        self.events_received.fetch_add(1, Ordering::Relaxed);
        if name != TAKE_SCREENSHOT {
            debug!(event = %name, "ignoring unhandled realtime event");
            return None;
        }
        let command = parse_screenshot_command(&payload)?;
        if command.subject_id != self.session.subject_id {
            self.commands_ignored.fetch_add(1, Ordering::Relaxed);
            debug!(target = %command.subject_id, "screenshot command for another subject");
            return None;
        }
        self.commands_accepted.fetch_add(1, Ordering::Relaxed);
        info!(requested_by = %command.requested_by, "screenshot command accepted");
        let listeners = self.command_listeners.lock();
        for listener in listeners.iter() {
            listener(command.clone());
        }
        Some(command)
    }

    pub fn events_received(&self) -> u64 {
        self.events_received.load(Ordering::Relaxed)
    }

    pub fn commands_accepted(&self) -> u64 {
        self.commands_accepted.load(Ordering::Relaxed)
    }

    pub fn commands_ignored(&self) -> u64 {
        self.commands_ignored.load(Ordering::Relaxed)
    }

    fn emit_status(&self, connected: bool) {
        let listeners = self.status_listeners.lock();
        for listener in listeners.iter() {
            listener(connected);
        }
    }
}
