mod agent;
mod platform;

use agent::AgentDaemon;
use anyhow::{bail, Result};
use arbiter_core::{AgentConfig, SessionContext};
use arbiter_device::{DeviceCatalog, MonitorFuser};
use arbiter_inventory::drivers::{DriverInventory, ProcModulesEnumerator};
use arbiter_inventory::{NoMetadata, ProcessInventory};
use platform::{
    DrmProbeSource, ProcNetTableSource, SysUsbEnumerator, SysinfoResolver, UnsupportedCapture,
};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AgentConfig::from_env();

    let level = if config.verbose_diagnostics {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Session identity comes from the login wrapper via environment
    let subject_id = std::env::var("ARBITER_SUBJECT_ID").unwrap_or_default();
    let channel_id: i64 = std::env::var("ARBITER_CHANNEL_ID")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let session = SessionContext::new(subject_id, channel_id);
    if !session.is_complete() && !config.skip_server_verification {
        bail!("ARBITER_SUBJECT_ID and ARBITER_CHANNEL_ID must be set");
    }

    info!(
        server = %config.server_base_url,
        interval = config.monitor_interval_secs,
        offline = config.skip_server_verification,
        "arbiter agent starting"
    );

    let daemon = AgentDaemon::new(
        config.clone(),
        session,
        DeviceCatalog::new(Box::new(SysUsbEnumerator::new())),
        MonitorFuser::new(Box::new(DrmProbeSource::new())),
        ProcessInventory::new(config.game_process_names.clone(), Box::new(NoMetadata)),
        DriverInventory::new(Box::new(ProcModulesEnumerator), Box::new(NoMetadata)),
        Arc::new(ProcNetTableSource),
        Arc::new(SysinfoResolver::new()),
        Arc::new(UnsupportedCapture),
    );

    daemon.start().await;

    tokio::signal::ctrl_c().await?;
    daemon.stop();
    // One grace period so in-flight sends finish before the process exits
    tokio::time::sleep(std::time::Duration::from_secs(1)).await;
    info!("arbiter agent stopped");
    Ok(())
}
