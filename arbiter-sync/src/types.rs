//! Typed request/response shapes for every server endpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Connection state as seen by the rest of the agent. Transitions happen
/// only through the connection check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Connected => write!(f, "Connected"),
        }
    }
}

/// `POST /game-status`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStatusRequest {
    pub subject_id: String,
    pub channel_id: i64,
    pub is_game_running: bool,
}

/// `POST /screenshot`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotUpload {
    pub subject_id: String,
    pub channel_id: i64,
    pub timestamp: DateTime<Utc>,
    /// Base64-encoded JPEG
    pub screenshot: String,
    /// Who asked for this frame: "user" or "judge"
    pub source: String,
}

/// `POST /error`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

/// `GET /screenshots/check-requests` response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotCheckResponse {
    pub has_request: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_details: Option<ScreenshotRequestDetails>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotRequestDetails {
    pub requested_by: String,
    #[serde(default)]
    pub timestamp: String,
    /// "user" or "judge"
    #[serde(default)]
    pub source: String,
}

/// Summary surfaced to the UI on request.
#[derive(Debug, Clone, Serialize)]
pub struct ClientDiagnostics {
    pub state: ConnectionState,
    pub last_error: Option<String>,
    pub server_url: String,
}
