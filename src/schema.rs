//! Registry and monitor table bootstrap.
//!
//! Creates the three tables this daemon depends on, under a configurable
//! prefix, so a fresh cluster can come up without a separate migration step.

use crate::config::DaemonConfig;
use crate::error::Result;
use crate::node::NodeClient;

/// Idempotently create `{prefix}_nodes`, `{prefix}_status` and
/// `{prefix}_monitor` against the primary session.
pub async fn ensure_schema(primary: &NodeClient, config: &DaemonConfig) -> Result<()> {
    let nodes = config.nodes_table();
    let status = config.status_table();
    let monitor = config.monitor_table();

    primary
        .exec(&format!(
            "CREATE TABLE IF NOT EXISTS {nodes} (
                id BIGINT PRIMARY KEY,
                cluster TEXT NOT NULL,
                conninfo TEXT NOT NULL
            )"
        ))
        .await?;

    primary
        .exec(&format!(
            "CREATE TABLE IF NOT EXISTS {status} (
                primary_node BIGINT,
                standby_node BIGINT PRIMARY KEY,
                last_lsn TEXT NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )"
        ))
        .await?;

    primary
        .exec(&format!(
            "CREATE TABLE IF NOT EXISTS {monitor} (
                primary_node BIGINT NOT NULL,
                standby_node BIGINT NOT NULL,
                ts TIMESTAMPTZ NOT NULL,
                primary_lsn TEXT NOT NULL,
                standby_received_lsn TEXT NOT NULL,
                standby_applied_lsn TEXT NOT NULL,
                receive_lag_bytes BIGINT NOT NULL,
                apply_lag_bytes BIGINT NOT NULL
            )"
        ))
        .await?;

    Ok(())
}
