//! Cluster directory: the registry of cluster members and their roles.
//!
//! Backed by the `{prefix}_nodes` / `{prefix}_status` tables rather than an
//! in-memory membership list, since it must survive this daemon restarting
//! and be visible to every other daemon in the cluster.

use sqlx::Row;

use crate::config::DaemonConfig;
use crate::error::Result;
use crate::lsn::Lsn;
use crate::node::NodeClient;

/// A cluster member as recorded in the registry.
#[derive(Debug, Clone)]
pub struct NodeIdentity {
    pub id: i64,
    pub conninfo: String,
}

/// Locate the current primary by probing each registered node in ascending
/// id order and asking whether it is a standby. The first node that answers
/// "no" is the primary. Returns `None` if no registered node answers.
pub async fn find_primary(
    local: &NodeClient,
    config: &DaemonConfig,
) -> Result<Option<(NodeClient, i64)>> {
    let nodes = list_nodes(local, config).await?;
    for node in nodes {
        let probe = match NodeClient::open(&node.conninfo, false).await {
            Ok(p) => p,
            Err(_) => continue,
        };
        if probe.status().await == crate::node::Status::Broken {
            continue;
        }
        match probe.is_standby().await {
            Ok(false) => return Ok(Some((probe, node.id))),
            _ => continue,
        }
    }
    Ok(None)
}

/// All nodes registered for this cluster, ordered by id.
pub async fn list_nodes(session: &NodeClient, config: &DaemonConfig) -> Result<Vec<NodeIdentity>> {
    let sql = format!(
        "SELECT id, conninfo FROM {} WHERE cluster = $1 ORDER BY id",
        config.nodes_table()
    );
    let rows = sqlx_fetch_all(session, &sql, &config.cluster_name).await?;
    Ok(rows
        .into_iter()
        .map(|(id, conninfo)| NodeIdentity { id, conninfo })
        .collect())
}

/// List every registered node except the local one.
pub async fn list_peer_standbys(
    session: &NodeClient,
    config: &DaemonConfig,
    self_id: i64,
) -> Result<Vec<NodeIdentity>> {
    Ok(list_nodes(session, config)
        .await?
        .into_iter()
        .filter(|n| n.id != self_id)
        .collect())
}

/// Idempotent self-registration, run once by a fresh standby against the
/// primary session.
pub async fn ensure_self_registered(
    primary: &NodeClient,
    config: &DaemonConfig,
    self_id: i64,
) -> Result<()> {
    let sql = format!(
        "INSERT INTO {} (id, cluster, conninfo) VALUES ({}, '{}', '{}')
         ON CONFLICT (id) DO UPDATE SET cluster = EXCLUDED.cluster, conninfo = EXCLUDED.conninfo",
        config.nodes_table(),
        self_id,
        config.cluster_name.replace('\'', "''"),
        config.conninfo.replace('\'', "''"),
    );
    primary.exec(&sql).await?;
    Ok(())
}

/// Publish this standby's latest applied LSN to the shared status table so
/// peers can read it during an election.
pub async fn publish_standby_location(
    session: &NodeClient,
    config: &DaemonConfig,
    self_id: i64,
    lsn: Lsn,
) -> Result<()> {
    let sql = format!(
        "INSERT INTO {} (standby_node, last_lsn, updated_at) VALUES ({}, '{}', now())
         ON CONFLICT (standby_node) DO UPDATE SET last_lsn = EXCLUDED.last_lsn, updated_at = now()",
        config.status_table(),
        self_id,
        lsn.format(),
    );
    session.exec(&sql).await?;
    Ok(())
}

/// Read a peer's last *published* standby location (not its live position),
/// so every elector compares against the same value each node reported of
/// itself in step 1.
pub async fn read_standby_location(peer: &NodeClient) -> Result<Lsn> {
    peer.published_standby_location().await
}

async fn sqlx_fetch_all(
    session: &NodeClient,
    sql: &str,
    cluster: &str,
) -> Result<Vec<(i64, String)>> {
    session.fetch_rows(sql, cluster).await?
        .into_iter()
        .map(|row| {
            let id: i64 = row.try_get(0)?;
            let conninfo: String = row.try_get(1)?;
            Ok((id, conninfo))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_identity_filters_self() {
        let nodes = vec![
            NodeIdentity { id: 1, conninfo: "a".into() },
            NodeIdentity { id: 2, conninfo: "b".into() },
        ];
        let peers: Vec<_> = nodes.into_iter().filter(|n| n.id != 1).collect();
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].id, 2);
    }
}
