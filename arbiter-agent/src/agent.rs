//! The agent daemon: owns every subsystem and the timers that drive
//! them.
//!
//! Four independent loops run on their own intervals — telemetry
//! snapshot + send, connection health, device-reconciliation fallback
//! scan, and the screenshot-request poll — plus the realtime channel
//! listener. They may overlap in wall-clock time; the shared state they
//! touch (the reconciler's set, the connection tracker, the capture
//! guard) is internally synchronized. Stopping the flag and letting the
//! loops drain is the only teardown.

use arbiter_core::{AgentConfig, SessionContext};
use arbiter_device::{DeviceCatalog, DeviceReconciler, MonitorFuser};
use arbiter_inventory::drivers::DriverInventory;
use arbiter_inventory::{hardware, system, ProcessInventory, Snapshot, SnapshotBuilder};
use arbiter_net::table::ConnectionTableSource;
use arbiter_net::{fetch_connections, ProcessNameResolver};
use arbiter_sync::realtime::RealtimeChannel;
use arbiter_sync::screenshot::FrameCapture;
use arbiter_sync::{ScreenshotPipeline, ScreenshotSource, SyncClient};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub struct AgentDaemon {
    config: AgentConfig,
    session: SessionContext,
    client: Arc<SyncClient>,
    catalog: Arc<DeviceCatalog>,
    fuser: Arc<MonitorFuser>,
    reconciler: Arc<DeviceReconciler>,
    processes: Arc<ProcessInventory>,
    drivers: Arc<DriverInventory>,
    pipeline: Arc<ScreenshotPipeline>,
    table_source: Arc<dyn ConnectionTableSource + Send + Sync>,
    pid_resolver: Arc<dyn ProcessNameResolver + Send + Sync>,
    capture: Arc<dyn FrameCapture>,
    running: Arc<AtomicBool>,
}

impl AgentDaemon {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: AgentConfig,
        session: SessionContext,
        catalog: DeviceCatalog,
        fuser: MonitorFuser,
        processes: ProcessInventory,
        drivers: DriverInventory,
        table_source: Arc<dyn ConnectionTableSource + Send + Sync>,
        pid_resolver: Arc<dyn ProcessNameResolver + Send + Sync>,
        capture: Arc<dyn FrameCapture>,
    ) -> Self {
        let client = Arc::new(SyncClient::new(&config));
        let pipeline = Arc::new(ScreenshotPipeline::new(
            client.clone(),
            config.fallback_dir.clone(),
            config.max_image_bytes,
        ));
        Self {
            config,
            session,
            client,
            catalog: Arc::new(catalog),
            fuser: Arc::new(fuser),
            reconciler: Arc::new(DeviceReconciler::new()),
            processes: Arc::new(processes),
            drivers: Arc::new(drivers),
            pipeline,
            table_source,
            pid_resolver,
            capture,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Seed the device set and start every loop. Returns once the loops
    /// are spawned; they run until [`stop`](Self::stop).
    pub async fn start(&self) {
        self.running.store(true, Ordering::Relaxed);
        self.reconciler.initialize(self.full_device_scan());
        info!(
            subject = %self.session.subject_id,
            channel = self.session.channel_id,
            devices = self.reconciler.attached_count(),
            "agent starting"
        );

        self.client.check_connection().await;

        self.spawn_monitor_loop();
        self.spawn_connection_loop();
        self.spawn_device_loop();
        self.spawn_screenshot_poll_loop();
        self.spawn_realtime_listener();
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
        info!("agent stopping; loops will drain on their next tick");
    }

    /// Catalog scan plus fused monitors, flattened to device records.
    fn full_device_scan(&self) -> Vec<arbiter_device::DeviceRecord> {
        let mut scan = self.catalog.scan();
        scan.extend(self.fuser.detect().iter().map(|m| m.to_device_record()));
        scan
    }

    /// Assemble one complete snapshot from every collector.
    pub fn build_snapshot(&self) -> Snapshot {
        let connections =
            fetch_connections(self.table_source.as_ref(), self.pid_resolver.as_ref());
        let monitors = self.fuser.detect();
        let primary_resolution = monitors
            .iter()
            .find(|m| m.is_primary)
            .or_else(|| monitors.first())
            .map(|m| m.resolution_string());

        let sys = sysinfo::System::new_all();
        let board = hardware::BoardIdentity::default();

        SnapshotBuilder::new(self.session.clone())
            .pc_start_time(system::boot_time_string())
            .game_running(self.processes.is_game_running())
            .processes(self.processes.collect())
            .devices(self.reconciler.current())
            .hardware(hardware::collect(&sys, &board))
            .system(system::collect(primary_resolution))
            .connections(connections)
            .drivers(self.drivers.collect())
            .build()
    }

    fn spawn_monitor_loop(&self) {
        let daemon = self.clone_refs();
        let interval = self.config.monitor_interval_secs;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(interval));
            ticker.tick().await; // the immediate first tick
            while daemon.running.load(Ordering::Relaxed) {
                let snapshot = daemon.build_snapshot();
                let game_running = snapshot.is_game_running;
                if !daemon.client.send_snapshot(&snapshot).await {
                    warn!("snapshot delivery failed; next cycle will retry");
                }
                daemon
                    .client
                    .send_game_state(&daemon.session, game_running)
                    .await;
                ticker.tick().await;
            }
        });
    }

    fn spawn_connection_loop(&self) {
        let daemon = self.clone_refs();
        let interval = self.config.connection_check_interval_secs;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(interval));
            while daemon.running.load(Ordering::Relaxed) {
                ticker.tick().await;
                daemon.client.check_connection().await;
            }
        });
    }

    fn spawn_device_loop(&self) {
        let daemon = self.clone_refs();
        let interval = self.config.device_scan_interval_secs;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(interval));
            while daemon.running.load(Ordering::Relaxed) {
                ticker.tick().await;
                let scan = daemon.full_device_scan();
                for change in daemon.reconciler.reconcile(scan) {
                    let direction = if change.attached { "attached" } else { "detached" };
                    info!(
                        device = %change.device.device_id,
                        name = %change.device.name,
                        trust = ?change.device.trust_level,
                        "device {direction}"
                    );
                }
            }
        });
    }

    fn spawn_screenshot_poll_loop(&self) {
        let daemon = self.clone_refs();
        let interval = self.config.screenshot_poll_interval_secs;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(interval));
            while daemon.running.load(Ordering::Relaxed) {
                ticker.tick().await;
                if let Some(details) = daemon.client.check_screenshot_request(&daemon.session).await
                {
                    let source = ScreenshotSource::from_tag(&details.source);
                    daemon.capture_once(source).await;
                }
            }
        });
    }

    fn spawn_realtime_listener(&self) {
        let daemon = self.clone_refs();
        let channel = Arc::new(RealtimeChannel::new(
            &self.config.server_base_url,
            self.session.clone(),
        ));
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        channel.on_command(Arc::new(move |command| {
            let _ = tx.send(command);
        }));

        // Commands arrive on the channel's read loop; captures run here
        let capture_daemon = self.clone_refs();
        tokio::spawn(async move {
            while let Some(command) = rx.recv().await {
                info!(requested_by = %command.requested_by, "realtime screenshot command");
                capture_daemon.capture_once(ScreenshotSource::Judge).await;
            }
        });

        tokio::spawn(async move {
            while daemon.running.load(Ordering::Relaxed) {
                if let Err(e) = channel.run().await {
                    warn!(error = %e, "realtime channel disconnected");
                }
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
        });
    }

    /// One capture/deliver cycle under the pipeline's re-entrancy guard.
    async fn capture_once(&self, source: ScreenshotSource) -> bool {
        match self.capture.capture() {
            Ok(encoder) => {
                self.pipeline
                    .process_capture(&self.session, encoder.as_ref(), source)
                    .await
            }
            Err(e) => {
                warn!(error = %e, "screen capture failed");
                self.client
                    .report_error(&format!("screen capture failed: {e}"))
                    .await;
                false
            }
        }
    }

    fn clone_refs(&self) -> AgentDaemon {
        AgentDaemon {
            config: self.config.clone(),
            session: self.session.clone(),
            client: self.client.clone(),
            catalog: self.catalog.clone(),
            fuser: self.fuser.clone(),
            reconciler: self.reconciler.clone(),
            processes: self.processes.clone(),
            drivers: self.drivers.clone(),
            pipeline: self.pipeline.clone(),
            table_source: self.table_source.clone(),
            pid_resolver: self.pid_resolver.clone(),
            capture: self.capture.clone(),
            running: self.running.clone(),
        }
    }
}
