//! # Arbiter Sync — delivery side of the telemetry agent
//!
//! - [`client::SyncClient`] — HTTP transport with bounded retries, a
//!   connection-state machine, and the screenshot-request poll
//! - [`screenshot`] — quality-degradation encoding ladder, delivery
//!   retries, and local fallback persistence
//! - [`realtime`] — persistent event-stream client decoding inbound
//!   commands

pub mod client;
pub mod realtime;
pub mod screenshot;
pub mod types;

pub use client::{ConnectionTracker, SyncClient};
pub use realtime::RealtimeChannel;
pub use screenshot::{
    FrameCapture, FrameEncoder, JpegFrameEncoder, ScreenshotPipeline, ScreenshotSource,
};
pub use types::{ConnectionState, ScreenshotCheckResponse, ScreenshotRequestDetails};

mod tests;
