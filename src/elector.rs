//! Failover elector: the distributed promotion decision run by a standby
//! that has lost its primary under `failover = AUTOMATIC`.

use crate::command;
use crate::config::DaemonConfig;
use crate::directory;
use crate::error::{Error, Result};
use crate::lsn::Lsn;
use crate::node::NodeClient;

/// A peer's reported standby location, gathered during an election.
#[derive(Debug, Clone)]
pub struct PeerSnapshot {
    pub node_id: i64,
    pub xlog_location: Lsn,
    pub is_ready: bool,
}

/// Outcome of an election, for logging and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    SelfPromoted,
    Following(i64),
}

/// Run the election. On success, reopens and returns the local session
/// (required this time, since the daemon cannot continue without it).
pub async fn run_election(
    local: NodeClient,
    config: &DaemonConfig,
    self_id: i64,
) -> Result<(NodeClient, Outcome)> {
    // Step 1: self-report, publishing a 0/0 sentinel on failure so peers
    // never mistake a crashed reporter for a viable candidate.
    let self_lsn = match local.standby_locations().await {
        Ok((_received, applied)) => {
            let _ = directory::publish_standby_location(&local, config, self_id, applied).await;
            applied
        }
        Err(e) => {
            let _ = directory::publish_standby_location(&local, config, self_id, Lsn::ZERO).await;
            return Err(e);
        }
    };

    // Step 2: enumerate peers.
    let peers = directory::list_peer_standbys(&local, config, self_id).await?;
    let total = peers.len() + 1;

    // Step 3: probe each peer.
    let mut snapshots = Vec::with_capacity(peers.len());
    for peer in &peers {
        let snapshot = probe_peer(peer.id, &peer.conninfo).await;
        snapshots.push(snapshot);
    }
    let visible = snapshots.iter().filter(|s| s.is_ready).count() + 1;

    // Step 4: quorum check.
    if !has_quorum(visible, total) {
        tracing::error!(visible, total, "quorum not reached, abandoning election");
        return Err(Error::QuorumNotReached { visible, total });
    }

    // Step 5: candidate selection.
    let best_id = select_candidate(self_id, self_lsn, &snapshots);

    tracing::info!(
        self_id,
        self_lsn = %self_lsn,
        candidates = ?snapshots,
        winner = best_id,
        "election decided"
    );

    // Step 6: act.
    let outcome = if best_id == self_id {
        command::run(&config.promote_command).await?;
        Outcome::SelfPromoted
    } else {
        command::run(&config.follow_command).await?;
        Outcome::Following(best_id)
    };

    // Step 7: reattach, required this time.
    local.close().await;
    let reattached = NodeClient::open(&config.conninfo, true).await?;
    Ok((reattached, outcome))
}

async fn probe_peer(node_id: i64, conninfo: &str) -> PeerSnapshot {
    let session = match NodeClient::open(conninfo, false).await {
        Ok(s) => s,
        Err(_) => {
            return PeerSnapshot {
                node_id,
                xlog_location: Lsn::ZERO,
                is_ready: false,
            }
        }
    };

    match directory::read_standby_location(&session).await {
        Ok(lsn) => PeerSnapshot {
            node_id,
            xlog_location: lsn,
            is_ready: true,
        },
        Err(_) => PeerSnapshot {
            node_id,
            xlog_location: Lsn::ZERO,
            is_ready: false,
        },
    }
}

/// Whether `visible` of `total` registered nodes satisfies quorum, using the
/// exact integer-truncation predicate (not `ceil(total/2)`).
pub fn has_quorum(visible: usize, total: usize) -> bool {
    visible >= total / 2
}

/// Pick the winning candidate from self plus a set of ready peers. Self
/// always wins ties by construction: it is the initial "best" and is only
/// ever displaced by a strictly greater LSN.
pub fn select_candidate(self_id: i64, self_lsn: Lsn, peers: &[PeerSnapshot]) -> i64 {
    let mut best_id = self_id;
    let mut best_lsn = self_lsn;
    for peer in peers {
        if peer.is_ready && peer.xlog_location > best_lsn {
            best_id = peer.node_id;
            best_lsn = peer.xlog_location;
        }
    }
    best_id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quorum_three_total_one_visible_holds() {
        // total=3, threshold = 3/2 = 1 (truncated); visible=1 passes.
        assert!(has_quorum(1, 3));
    }

    #[test]
    fn quorum_four_total_one_visible_fails() {
        // total=4, threshold = 4/2 = 2; visible=1 fails.
        assert!(!has_quorum(1, 4));
    }

    #[test]
    fn quorum_four_total_two_visible_holds() {
        assert!(has_quorum(2, 4));
    }

    #[test]
    fn self_wins_ties() {
        let self_lsn = Lsn::new(0, 0x200);
        let peers = vec![PeerSnapshot {
            node_id: 2,
            xlog_location: self_lsn,
            is_ready: true,
        }];
        assert_eq!(select_candidate(1, self_lsn, &peers), 1);
    }

    #[test]
    fn strictly_greater_peer_wins() {
        let self_lsn = Lsn::new(0, 0x200);
        let peers = vec![PeerSnapshot {
            node_id: 2,
            xlog_location: Lsn::new(0, 0x300),
            is_ready: true,
        }];
        assert_eq!(select_candidate(1, self_lsn, &peers), 2);
    }

    #[test]
    fn unreachable_peer_is_excluded_from_candidacy() {
        let self_lsn = Lsn::new(0, 0x100);
        let peers = vec![PeerSnapshot {
            node_id: 2,
            xlog_location: Lsn::new(0, 0x900),
            is_ready: false,
        }];
        assert_eq!(select_candidate(1, self_lsn, &peers), 1);
    }
}
