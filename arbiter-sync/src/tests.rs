#[cfg(test)]
mod tests {
    use crate::client::{rejection_hint, ConnectionTracker, SyncClient};
    use crate::realtime::*;
    use crate::screenshot::*;
    use crate::types::*;
    use arbiter_core::{AgentConfig, AgentResult, SessionContext};
    use arbiter_inventory::SnapshotBuilder;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    fn offline_config() -> AgentConfig {
        AgentConfig {
            skip_server_verification: true,
            ..AgentConfig::default()
        }
    }

    fn session() -> SessionContext {
        SessionContext::new("Player#1234567", 12)
    }

    // ── connection tracker ──────────────────────────────────────────

    #[test]
    fn test_tracker_fires_exactly_once_per_transition() {
        let tracker = ConnectionTracker::new();
        let events = Arc::new(AtomicU64::new(0));
        let counter = events.clone();
        tracker.subscribe(Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        // Repeated failures from the initial Disconnected state: silent
        assert!(!tracker.observe(false, Some("refused".into())));
        assert!(!tracker.observe(false, Some("refused".into())));
        assert_eq!(events.load(Ordering::SeqCst), 0);

        // Disconnected → Connected
        assert!(tracker.observe(true, None));
        assert_eq!(events.load(Ordering::SeqCst), 1);

        // Repeated success: silent
        assert!(!tracker.observe(true, None));
        assert_eq!(events.load(Ordering::SeqCst), 1);

        // Connected → Disconnected after retries exhausted: exactly one
        assert!(tracker.observe(false, Some("timed out".into())));
        assert_eq!(events.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.transitions(), 2);
        assert_eq!(tracker.last_error().as_deref(), Some("timed out"));
        assert_eq!(tracker.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_tracker_connecting_is_probe_scoped() {
        let tracker = ConnectionTracker::new();
        tracker.begin_probe();
        assert_eq!(tracker.state(), ConnectionState::Connecting);
        tracker.observe(true, None);
        assert_eq!(tracker.state(), ConnectionState::Connected);
        // A probe from Connected does not regress the visible state
        tracker.begin_probe();
        assert_eq!(tracker.state(), ConnectionState::Connected);
    }

    #[test]
    fn test_rejection_hints_by_status_range() {
        use reqwest::StatusCode;
        assert!(rejection_hint(StatusCode::UNAUTHORIZED).contains("authorization"));
        assert!(rejection_hint(StatusCode::FORBIDDEN).contains("authorization"));
        assert!(rejection_hint(StatusCode::NOT_FOUND).contains("misconfigured"));
        assert!(rejection_hint(StatusCode::INTERNAL_SERVER_ERROR).contains("server-side"));
        assert!(rejection_hint(StatusCode::BAD_GATEWAY).contains("server-side"));
    }

    // ── local validation ────────────────────────────────────────────

    #[tokio::test]
    async fn test_empty_subject_makes_zero_wire_calls() {
        let client = SyncClient::new(&AgentConfig::default());
        let snapshot = SnapshotBuilder::new(SessionContext::new("", 12)).build();
        assert!(!client.send_snapshot(&snapshot).await);
        assert_eq!(client.wire_calls(), 0);
    }

    #[tokio::test]
    async fn test_invalid_channel_makes_zero_wire_calls() {
        let client = SyncClient::new(&AgentConfig::default());
        let snapshot = SnapshotBuilder::new(SessionContext::new("Player#1", 0)).build();
        assert!(!client.send_snapshot(&snapshot).await);
        assert!(!client.send_game_state(&SessionContext::new("Player#1", 0), true).await);
        assert_eq!(client.wire_calls(), 0);
    }

    #[tokio::test]
    async fn test_offline_mode_short_circuits() {
        let client = SyncClient::new(&offline_config());
        assert!(client.check_connection().await);
        assert!(client.is_connected());
        let snapshot = SnapshotBuilder::new(session()).build();
        assert!(client.send_snapshot(&snapshot).await);
        assert!(client.report_error("diagnostic").await);
        assert!(client.check_screenshot_request(&session()).await.is_none());
        assert_eq!(client.wire_calls(), 0);
    }

    // ── screenshot ladder ───────────────────────────────────────────

    /// Size model: bytes scale with quality and shrink quadratically
    /// with the dimension divisor.
    struct ModelEncoder {
        base: usize,
        calls: AtomicU64,
    }

    impl ModelEncoder {
        fn new(base: usize) -> Self {
            Self {
                base,
                calls: AtomicU64::new(0),
            }
        }
    }

    impl FrameEncoder for ModelEncoder {
        fn encode(&self, quality: u8, divisor: u32) -> AgentResult<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let size = self.base * quality as usize / 85 / (divisor * divisor) as usize;
            Ok(vec![0u8; size])
        }
    }

    #[test]
    fn test_ladder_first_rung_when_under_cap() {
        let encoder = ModelEncoder::new(1_000_000);
        let (bytes, within) = encode_within_cap(&encoder, 5_000_000).unwrap();
        assert!(within);
        assert_eq!(bytes.len(), 1_000_000);
        assert_eq!(encoder.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_ladder_degrades_within_three_steps() {
        // Full quality ≈ 10MB, cap 5MB: quality drop alone is enough
        let encoder = ModelEncoder::new(10_000_000);
        let (bytes, within) = encode_within_cap(&encoder, 5_000_000).unwrap();
        assert!(within);
        assert!(bytes.len() <= 5_000_000);
        assert!(encoder.calls.load(Ordering::SeqCst) <= 3);

        // Full quality ≈ 30MB, cap 5MB: needs the halved-dimension rung
        let encoder = ModelEncoder::new(30_000_000);
        let (bytes, within) = encode_within_cap(&encoder, 5_000_000).unwrap();
        assert!(within);
        assert!(bytes.len() <= 5_000_000);
        assert_eq!(encoder.calls.load(Ordering::SeqCst), 3);

        // Full quality ≈ 60MB, cap 5MB: the thirded rung still lands it
        let encoder = ModelEncoder::new(60_000_000);
        let (bytes, within) = encode_within_cap(&encoder, 5_000_000).unwrap();
        assert!(within);
        assert!(bytes.len() <= 5_000_000);
        assert_eq!(encoder.calls.load(Ordering::SeqCst), QUALITY_LADDER.len() as u64);
    }

    #[test]
    fn test_ladder_exhaustion_returns_smallest_and_terminates() {
        let encoder = ModelEncoder::new(10_000_000);
        let (bytes, within) = encode_within_cap(&encoder, 1).unwrap();
        assert!(!within);
        // The thirded, lowest-quality rung is the smallest
        assert_eq!(bytes.len(), 10_000_000 * 35 / 85 / 9);
        assert_eq!(encoder.calls.load(Ordering::SeqCst), QUALITY_LADDER.len() as u64);
    }

    #[test]
    fn test_ladder_is_strictly_decreasing_under_monotone_model() {
        let encoder = ModelEncoder::new(10_000_000);
        let sizes: Vec<usize> = QUALITY_LADDER
            .iter()
            .map(|&(q, d)| encoder.encode(q, d).unwrap().len())
            .collect();
        for pair in sizes.windows(2) {
            assert!(pair[1] < pair[0], "ladder rung did not shrink: {sizes:?}");
        }
    }

    #[test]
    fn test_jpeg_encoder_quality_and_scale_reduce_size() {
        use image::{DynamicImage, Rgb, RgbImage};
        // A gradient, so JPEG quality actually affects the output size
        let img = RgbImage::from_fn(256, 128, |x, y| {
            Rgb([(x % 256) as u8, (y * 2 % 256) as u8, ((x + y) % 256) as u8])
        });
        let encoder = JpegFrameEncoder::new(DynamicImage::ImageRgb8(img));
        let full = encoder.encode(85, 1).unwrap();
        let low = encoder.encode(35, 1).unwrap();
        let scaled = encoder.encode(35, 2).unwrap();
        assert!(!full.is_empty());
        assert!(low.len() < full.len());
        assert!(scaled.len() < low.len());
    }

    #[test]
    fn test_fallback_filename_sanitized_and_deterministic() {
        assert_eq!(
            fallback_filename("Player#1234567", 1754550000),
            "Player_1234567_1754550000.jpg"
        );
        assert_eq!(
            fallback_filename("Player#1234567", 1754550000),
            fallback_filename("Player#1234567", 1754550000)
        );
    }

    #[test]
    fn test_source_tags() {
        assert_eq!(ScreenshotSource::Judge.as_str(), "judge");
        assert_eq!(ScreenshotSource::from_tag("judge"), ScreenshotSource::Judge);
        assert_eq!(ScreenshotSource::from_tag("JUDGE"), ScreenshotSource::Judge);
        assert_eq!(ScreenshotSource::from_tag("user"), ScreenshotSource::User);
        assert_eq!(ScreenshotSource::from_tag(""), ScreenshotSource::User);
    }

    #[tokio::test]
    async fn test_pipeline_delivers_in_offline_mode() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(SyncClient::new(&offline_config()));
        let pipeline = ScreenshotPipeline::new(client, dir.path(), 5_000_000);
        let encoder = ModelEncoder::new(1_000_000);
        assert!(
            pipeline
                .process_capture(&session(), &encoder, ScreenshotSource::Judge)
                .await
        );
        assert_eq!(pipeline.captures_delivered(), 1);
        assert_eq!(pipeline.captures_persisted(), 0);
        assert!(!pipeline.capture_in_progress());
    }

    #[tokio::test]
    async fn test_failed_delivery_persists_fallback() {
        let dir = tempfile::tempdir().unwrap();
        // Nothing listens on the discard port: every attempt fails fast
        let config = AgentConfig {
            server_base_url: "http://127.0.0.1:1".into(),
            request_timeout_secs: 1,
            ..AgentConfig::default()
        };
        let client = Arc::new(SyncClient::new(&config));
        let pipeline = ScreenshotPipeline::new(client, dir.path(), 5_000_000);
        let encoder = ModelEncoder::new(1024);

        assert!(
            !pipeline
                .process_capture(&session(), &encoder, ScreenshotSource::User)
                .await
        );
        assert_eq!(pipeline.captures_persisted(), 1);
        assert_eq!(pipeline.captures_delivered(), 0);

        let files: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(files.len(), 1);
        assert!(files[0].starts_with("Player_1234567_"));
        assert!(files[0].ends_with(".jpg"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_overlapping_capture_dropped_not_queued() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(SyncClient::new(&offline_config()));
        let pipeline = Arc::new(ScreenshotPipeline::new(client, dir.path(), 5_000_000));

        struct BlockingEncoder {
            gate: std::sync::Mutex<std::sync::mpsc::Receiver<()>>,
        }
        impl FrameEncoder for BlockingEncoder {
            fn encode(&self, _quality: u8, _divisor: u32) -> AgentResult<Vec<u8>> {
                let _ = self.gate.lock().unwrap().recv();
                Ok(vec![0u8; 64])
            }
        }

        let (release, gate) = std::sync::mpsc::channel();
        let slow = pipeline.clone();
        let first = tokio::spawn(async move {
            let encoder = BlockingEncoder {
                gate: std::sync::Mutex::new(gate),
            };
            slow.process_capture(&session(), &encoder, ScreenshotSource::User)
                .await
        });

        while !pipeline.capture_in_progress() {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }

        // Second request during the active cycle: dropped, not queued
        let encoder = ModelEncoder::new(64);
        assert!(
            !pipeline
                .process_capture(&session(), &encoder, ScreenshotSource::Judge)
                .await
        );
        assert_eq!(pipeline.captures_dropped(), 1);

        release.send(()).unwrap();
        assert!(first.await.unwrap());
        assert_eq!(pipeline.captures_delivered(), 1);
    }

    // ── realtime channel ────────────────────────────────────────────

    #[test]
    fn test_websocket_url_derivation() {
        assert_eq!(
            websocket_url("https://compliance.example.net/api"),
            "wss://compliance.example.net/socket.io/?EIO=3&transport=websocket"
        );
        assert_eq!(
            websocket_url("http://localhost:3000"),
            "ws://localhost:3000/socket.io/?EIO=3&transport=websocket"
        );
    }

    #[test]
    fn test_decode_event_frames() {
        let (name, payload) =
            decode_event("42[\"take-screenshot\",{\"subjectId\":\"Player#1\"}]").unwrap();
        assert_eq!(name, "take-screenshot");
        assert_eq!(payload["subjectId"], "Player#1");

        // Heartbeats and acks carry no event
        assert!(decode_event("3").is_none());
        assert!(decode_event("40").is_none());
        assert!(decode_event("42 not json").is_none());
        // Event with no payload decodes with a null payload
        let (name, payload) = decode_event("42[\"ping\"]").unwrap();
        assert_eq!(name, "ping");
        assert!(payload.is_null());
    }

    #[test]
    fn test_screenshot_command_subject_filtering() {
        let channel = RealtimeChannel::new("https://compliance.example.net/api", session());

        let accepted = channel.handle_frame(
            "42[\"take-screenshot\",{\"subjectId\":\"Player#1234567\",\"requestedBy\":\"judge-3\"}]",
        );
        assert_eq!(
            accepted,
            Some(ScreenshotCommand {
                subject_id: "Player#1234567".into(),
                requested_by: "judge-3".into(),
            })
        );

        // Command addressed to a different subject is ignored
        let ignored = channel.handle_frame(
            "42[\"take-screenshot\",{\"subjectId\":\"SomeoneElse#1\",\"requestedBy\":\"judge-3\"}]",
        );
        assert!(ignored.is_none());
        assert_eq!(channel.commands_accepted(), 1);
        assert_eq!(channel.commands_ignored(), 1);

        // Unrelated events are not commands
        assert!(channel.handle_frame("42[\"status-update\",{}]").is_none());
        assert_eq!(channel.events_received(), 3);
    }

    #[test]
    fn test_command_listener_invoked_once() {
        let channel = RealtimeChannel::new("https://x.example/api", session());
        let seen = Arc::new(AtomicU64::new(0));
        let counter = seen.clone();
        channel.on_command(Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        channel.handle_frame("42[\"take-screenshot\",{\"subjectId\":\"Player#1234567\"}]");
        channel.handle_frame("42[\"take-screenshot\",{\"subjectId\":\"Nope#0\"}]");
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_check_response_deserializes_optional_details() {
        let with: ScreenshotCheckResponse = serde_json::from_str(
            "{\"hasRequest\":true,\"requestDetails\":{\"requestedBy\":\"judge-7\",\"timestamp\":\"2026-08-07T10:00:00Z\",\"source\":\"judge\"}}",
        )
        .unwrap();
        assert!(with.has_request);
        assert_eq!(with.request_details.unwrap().source, "judge");

        let without: ScreenshotCheckResponse =
            serde_json::from_str("{\"hasRequest\":false}").unwrap();
        assert!(!without.has_request);
        assert!(without.request_details.is_none());
    }
}
