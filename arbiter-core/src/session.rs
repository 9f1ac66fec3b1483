//! Session identity shared by every telemetry component.
//!
//! The subject/channel pair correlates all data for one monitored player
//! in one tournament lane. It is fixed at login and passed explicitly
//! into each component — components never reach into global state for it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    /// The monitored player identity
    pub subject_id: String,
    /// The tournament lane scoping this subject's data
    pub channel_id: i64,
    /// When this agent instance started
    pub client_start_time: DateTime<Utc>,
}

impl SessionContext {
    pub fn new(subject_id: impl Into<String>, channel_id: i64) -> Self {
        Self {
            subject_id: subject_id.into(),
            channel_id,
            client_start_time: Utc::now(),
        }
    }

    /// Both correlation identifiers are present and plausible.
    pub fn is_complete(&self) -> bool {
        !self.subject_id.is_empty() && self.channel_id > 0
    }
}
