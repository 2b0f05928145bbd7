//! Headless agent: runs the offline queue's background sync against the configured API.

use anyhow::Context;

use fieldops_infra::FieldOpsConfig;
use fieldops_mobile::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fieldops_observability::init();

    let config = FieldOpsConfig::from_env().context("invalid configuration")?;
    tracing::info!(
        api_url = %config.api_url,
        db_path = %config.db_path.display(),
        sync_interval = ?config.sync.sync_interval,
        "starting fieldops agent"
    );

    let state = AppState::connect(&config).await?;
    let tasks = state.start_with_config(&config);

    let status = state
        .queue
        .status()
        .await
        .context("failed to read queue status")?;
    tracing::info!(
        pending = status.pending,
        dead_lettered = status.dead_lettered,
        "offline queue loaded"
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("shutdown requested");

    tasks.shutdown().await;
    Ok(())
}
