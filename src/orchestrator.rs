//! Daemon orchestrator: startup self-identification and the periodic tick
//! loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::sleep;

use crate::config::DaemonConfig;
use crate::directory;
use crate::error::{exit_code_for, Error, ExitCode, Result};
use crate::lag;
use crate::node::NodeClient;
use crate::schema;
use crate::supervisor::{self, PrimaryBinding};

/// Run the daemon to completion, returning the exit code the process
/// should terminate with. Never panics on an expected failure mode; every
/// exit path is reached through a returned `Error`.
pub async fn run(config: DaemonConfig) -> ExitCode {
    match run_inner(config).await {
        Ok(()) => ExitCode::Success,
        Err(Error::ShuttingDown) | Err(Error::Cancelled) => {
            tracing::info!("daemon stopped on signal");
            ExitCode::Success
        }
        Err(e) => {
            tracing::error!(error = %e, "daemon exiting");
            exit_code_for(&e)
        }
    }
}

async fn run_inner(config: DaemonConfig) -> Result<()> {
    let cancelled = Arc::new(AtomicBool::new(false));
    {
        let cancelled = Arc::clone(&cancelled);
        ctrlc::set_handler(move || {
            tracing::info!("shutdown requested");
            cancelled.store(true, Ordering::Relaxed);
        })
        .map_err(|e| Error::Config(format!("failed to install signal handler: {e}")))?;
    }

    let local = NodeClient::open(&config.conninfo, true).await?;

    if !local.is_standby().await? {
        tracing::info!("local node is the primary at startup, nothing to monitor");
        local.close().await;
        return Ok(());
    }

    let primary_binding = match directory::find_primary(&local, &config).await? {
        Some((session, node_id)) => PrimaryBinding { session, node_id },
        None => {
            local.close().await;
            return Err(Error::NoPrimary(config.cluster_name.clone()));
        }
    };

    schema::ensure_schema(&primary_binding.session, &config).await?;
    directory::ensure_self_registered(&primary_binding.session, &config, config.node).await?;

    let result = tick_loop(local, primary_binding, &config, &cancelled).await;
    result
}

async fn tick_loop(
    mut local: NodeClient,
    mut primary: PrimaryBinding,
    config: &DaemonConfig,
    cancelled: &Arc<AtomicBool>,
) -> Result<()> {
    loop {
        if cancelled.load(Ordering::Relaxed) {
            tracing::info!("shutting down cleanly");
            local.close().await;
            primary.session.close().await;
            return Err(Error::ShuttingDown);
        }

        if !local.is_standby().await? {
            local.close().await;
            primary.session.close().await;
            return Err(Error::Promoted);
        }

        let (new_primary, new_local) =
            supervisor::ensure_primary(primary, local, config, config.node, cancelled).await?;
        primary = new_primary;
        local = new_local;

        match lag::run_tick(&local, &primary.session, config, config.node, primary.node_id).await
        {
            Ok(sample) => tracing::debug!(
                receive_lag = sample.receive_lag_bytes,
                apply_lag = sample.apply_lag_bytes,
                "tick complete"
            ),
            Err(e) => tracing::warn!(error = %e, "tick failed, will retry"),
        }

        sleep(config.tick_interval()).await;
    }
}
