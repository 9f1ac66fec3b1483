//! Screenshot encoding ladder and delivery.
//!
//! Capture hands us one frame; this module owns everything after the
//! pixels: encode at descending quality/scale until the configured size
//! cap is met, deliver with bounded linear-backoff retries, and persist
//! locally when delivery keeps failing so no captured frame is silently
//! discarded. A compare-exchange guard keeps at most one cycle running
//! per agent instance.

use crate::client::SyncClient;
use crate::types::ScreenshotUpload;
use arbiter_core::{AgentError, AgentResult, SessionContext};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Who asked for the capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenshotSource {
    User,
    Judge,
}

impl ScreenshotSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScreenshotSource::User => "user",
            ScreenshotSource::Judge => "judge",
        }
    }

    pub fn from_tag(tag: &str) -> Self {
        if tag.eq_ignore_ascii_case("judge") {
            ScreenshotSource::Judge
        } else {
            ScreenshotSource::User
        }
    }
}

/// Encodes the captured frame at a given JPEG quality and 1/divisor
/// scale. The seam keeps the ladder testable against a size model.
pub trait FrameEncoder: Send + Sync {
    fn encode(&self, quality: u8, divisor: u32) -> AgentResult<Vec<u8>>;
}

/// The thin OS call that reads the framebuffer. Everything after the
/// pixels belongs to this module.
pub trait FrameCapture: Send + Sync {
    fn capture(&self) -> AgentResult<Box<dyn FrameEncoder>>;
}

/// Production encoder over one captured frame.
pub struct JpegFrameEncoder {
    frame: DynamicImage,
}

impl JpegFrameEncoder {
    pub fn new(frame: DynamicImage) -> Self {
        Self { frame }
    }
}

impl FrameEncoder for JpegFrameEncoder {
    fn encode(&self, quality: u8, divisor: u32) -> AgentResult<Vec<u8>> {
        let frame = if divisor > 1 {
            self.frame.resize(
                (self.frame.width() / divisor).max(1),
                (self.frame.height() / divisor).max(1),
                FilterType::Triangle,
            )
        } else {
            self.frame.clone()
        };
        let mut buf = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
        frame
            .write_with_encoder(encoder)
            .map_err(|e| AgentError::Encode(e.to_string()))?;
        Ok(buf)
    }
}

/// The degradation ladder: full quality, reduced quality, then reduced
/// quality at halved and thirded dimensions. Strictly decreasing, so a
/// run over it always terminates.
pub const QUALITY_LADDER: &[(u8, u32)] = &[(85, 1), (50, 1), (50, 2), (35, 3)];

/// Walk the ladder until the encoding fits `cap`. Returns the bytes and
/// whether the cap was met; when even the smallest rung is over cap the
/// smallest encoding comes back with `false`.
pub fn encode_within_cap(encoder: &dyn FrameEncoder, cap: usize) -> AgentResult<(Vec<u8>, bool)> {
    let mut smallest: Option<Vec<u8>> = None;
    for &(quality, divisor) in QUALITY_LADDER {
        let bytes = encoder.encode(quality, divisor)?;
        if bytes.len() <= cap {
            return Ok((bytes, true));
        }
        if smallest.as_ref().map_or(true, |s| bytes.len() < s.len()) {
            smallest = Some(bytes);
        }
    }
    let bytes = smallest.ok_or_else(|| AgentError::Encode("empty quality ladder".into()))?;
    warn!(size = bytes.len(), cap, "screenshot exceeds cap at the lowest ladder rung");
    Ok((bytes, false))
}

const DELIVERY_ATTEMPTS: u32 = 3;

pub struct ScreenshotPipeline {
    client: Arc<SyncClient>,
    fallback_dir: PathBuf,
    max_bytes: usize,
    capture_in_progress: AtomicBool,
    captures_delivered: AtomicU64,
    captures_persisted: AtomicU64,
    captures_dropped: AtomicU64,
}

impl ScreenshotPipeline {
    pub fn new(client: Arc<SyncClient>, fallback_dir: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self {
            client,
            fallback_dir: fallback_dir.into(),
            max_bytes,
            capture_in_progress: AtomicBool::new(false),
            captures_delivered: AtomicU64::new(0),
            captures_persisted: AtomicU64::new(0),
            captures_dropped: AtomicU64::new(0),
        }
    }

    /// Run one encode-and-deliver cycle for an already-captured frame.
    ///
    /// Returns true when the server accepted the frame. A request
    /// arriving while a cycle is active is dropped with a diagnostic,
    /// not queued.
    pub async fn process_capture(
        &self,
        session: &SessionContext,
        encoder: &dyn FrameEncoder,
        source: ScreenshotSource,
    ) -> bool {
        if self
            .capture_in_progress
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            self.captures_dropped.fetch_add(1, Ordering::Relaxed);
            warn!(source = source.as_str(), "capture already in progress; request dropped");
            return false;
        }
        let result = self.encode_and_deliver(session, encoder, source).await;
        self.capture_in_progress.store(false, Ordering::SeqCst);
        result
    }

    async fn encode_and_deliver(
        &self,
        session: &SessionContext,
        encoder: &dyn FrameEncoder,
        source: ScreenshotSource,
    ) -> bool {
        let bytes = match encode_within_cap(encoder, self.max_bytes) {
            Ok((bytes, _within_cap)) => bytes,
            Err(e) => {
                warn!(error = %e, "screenshot encode failed");
                return false;
            }
        };

        let upload = ScreenshotUpload {
            subject_id: session.subject_id.clone(),
            channel_id: session.channel_id,
            timestamp: Utc::now(),
            screenshot: BASE64.encode(&bytes),
            source: source.as_str().to_string(),
        };

        for attempt in 1..=DELIVERY_ATTEMPTS {
            if self.client.send_screenshot(&upload).await {
                self.captures_delivered.fetch_add(1, Ordering::Relaxed);
                info!(attempt, source = source.as_str(), size = bytes.len(), "screenshot delivered");
                return true;
            }
            if attempt < DELIVERY_ATTEMPTS {
                tokio::time::sleep(Duration::from_secs(attempt as u64)).await;
            }
        }

        self.persist_fallback(session, &bytes);
        false
    }

    /// All delivery attempts failed: keep the frame on disk under a
    /// name derived from subject id and timestamp.
    fn persist_fallback(&self, session: &SessionContext, bytes: &[u8]) {
        let filename = fallback_filename(&session.subject_id, Utc::now().timestamp());
        let path = self.fallback_dir.join(filename);
        if let Err(e) = std::fs::create_dir_all(&self.fallback_dir) {
            warn!(error = %e, dir = %self.fallback_dir.display(), "cannot create fallback dir");
            return;
        }
        match std::fs::write(&path, bytes) {
            Ok(()) => {
                self.captures_persisted.fetch_add(1, Ordering::Relaxed);
                warn!(path = %path.display(), "undelivered screenshot persisted locally");
            }
            Err(e) => warn!(error = %e, path = %path.display(), "fallback persistence failed"),
        }
    }

    pub fn captures_delivered(&self) -> u64 {
        self.captures_delivered.load(Ordering::Relaxed)
    }

    pub fn captures_persisted(&self) -> u64 {
        self.captures_persisted.load(Ordering::Relaxed)
    }

    pub fn captures_dropped(&self) -> u64 {
        self.captures_dropped.load(Ordering::Relaxed)
    }

    pub fn capture_in_progress(&self) -> bool {
        self.capture_in_progress.load(Ordering::SeqCst)
    }
}

/// Deterministic fallback name: sanitized subject id + Unix timestamp.
pub fn fallback_filename(subject_id: &str, timestamp: i64) -> String {
    let sanitized: String = subject_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("{sanitized}_{timestamp}.jpg")
}
