//! Primary supervisor: owns the primary connection and runs the reconnect
//! ladder when it is lost.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Duration};

use crate::config::{DaemonConfig, FailoverMode};
use crate::directory;
use crate::elector;
use crate::error::{Error, Result};
use crate::node::{NodeClient, Status};

const RECONNECT_ATTEMPTS: u32 = 15;
const RECONNECT_INTERVAL: Duration = Duration::from_secs(20);

const REDISCOVER_ATTEMPTS: u32 = 6;
const REDISCOVER_INTERVAL: Duration = Duration::from_secs(300);

/// Holds the live session to whichever node is currently primary.
pub struct PrimaryBinding {
    pub session: NodeClient,
    pub node_id: i64,
}

/// Ensure the primary session is usable, running the reconnect ladder and,
/// if needed, the mode-specific recovery branch. Takes ownership of the
/// local session because an automatic election closes and reopens it;
/// returns both the (possibly new) primary binding and the local session to
/// continue with.
pub async fn ensure_primary(
    binding: PrimaryBinding,
    local: NodeClient,
    config: &DaemonConfig,
    self_id: i64,
    cancelled: &Arc<AtomicBool>,
) -> Result<(PrimaryBinding, NodeClient)> {
    if binding.session.status().await == Status::Ok {
        return Ok((binding, local));
    }

    for attempt in 1..=RECONNECT_ATTEMPTS {
        if cancelled.load(Ordering::Relaxed) {
            return Err(Error::Cancelled);
        }
        if binding.session.reset().await == Status::Ok {
            tracing::info!(attempt, "primary connection restored");
            return Ok((binding, local));
        }
        tracing::warn!(attempt, max = RECONNECT_ATTEMPTS, "primary still unreachable");
        sleep(RECONNECT_INTERVAL).await;
    }

    tracing::error!("primary unreachable after reconnect ladder, entering recovery");

    if !local.is_standby().await.unwrap_or(true) {
        return Err(Error::Promoted);
    }

    match config.failover {
        FailoverMode::Manual => {
            let new_binding = rediscover(&local, config, cancelled).await?;
            Ok((new_binding, local))
        }
        FailoverMode::Automatic => {
            let (new_local, outcome) = elector::run_election(local, config, self_id).await?;
            match outcome {
                // The tick loop will notice this node is no longer a
                // standby on its next iteration and exit ERR_PROMOTED; the
                // primary binding below is never acted on, so pointing it
                // at the local session itself is harmless.
                elector::Outcome::SelfPromoted => {
                    let self_session = NodeClient::open(&config.conninfo, true).await?;
                    Ok((
                        PrimaryBinding {
                            session: self_session,
                            node_id: self_id,
                        },
                        new_local,
                    ))
                }
                elector::Outcome::Following(winner_id) => {
                    match directory::find_primary(&new_local, config).await? {
                        Some((session, node_id)) => {
                            Ok((PrimaryBinding { session, node_id }, new_local))
                        }
                        None => Err(Error::ConnectionFailed {
                            address: format!("node {winner_id}"),
                            reason: "elected primary not reachable after promotion".to_string(),
                        }),
                    }
                }
            }
        }
    }
}

/// MANUAL-mode rediscovery: poll the directory for a newly promoted primary.
async fn rediscover(
    local: &NodeClient,
    config: &DaemonConfig,
    cancelled: &Arc<AtomicBool>,
) -> Result<PrimaryBinding> {
    for attempt in 1..=REDISCOVER_ATTEMPTS {
        if cancelled.load(Ordering::Relaxed) {
            return Err(Error::Cancelled);
        }
        if let Some((session, node_id)) = directory::find_primary(local, config).await? {
            tracing::info!(attempt, node_id, "new primary discovered");
            return Ok(PrimaryBinding { session, node_id });
        }
        tracing::warn!(attempt, max = REDISCOVER_ATTEMPTS, "no primary found yet");
        sleep(REDISCOVER_INTERVAL).await;
    }
    Err(Error::ConnectionFailed {
        address: config.conninfo.clone(),
        reason: "no primary found within rediscovery window".to_string(),
    })
}
