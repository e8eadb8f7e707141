//! Lag reporter: one tick of replication-lag measurement.

use chrono::Utc;

use crate::config::DaemonConfig;
use crate::error::Result;
use crate::lsn::Lsn;
use crate::node::NodeClient;

/// One measured sample, ready to be inserted into the monitor table.
#[derive(Debug, Clone)]
pub struct LagSample {
    pub primary_node: i64,
    pub standby_node: i64,
    pub primary_lsn: Lsn,
    pub standby_received_lsn: Lsn,
    pub standby_applied_lsn: Lsn,
    pub receive_lag_bytes: u64,
    pub apply_lag_bytes: u64,
}

impl LagSample {
    pub fn measure(
        primary_node: i64,
        standby_node: i64,
        primary_lsn: Lsn,
        standby_received_lsn: Lsn,
        standby_applied_lsn: Lsn,
    ) -> Self {
        Self {
            primary_node,
            standby_node,
            primary_lsn,
            standby_received_lsn,
            standby_applied_lsn,
            receive_lag_bytes: primary_lsn.bytes_behind(&standby_received_lsn),
            apply_lag_bytes: standby_received_lsn.bytes_behind(&standby_applied_lsn),
        }
    }
}

/// Run one monitoring tick: harvest any previous async insert, read local
/// and primary positions, and fire off the next async insert.
pub async fn run_tick(
    local: &NodeClient,
    primary: &NodeClient,
    config: &DaemonConfig,
    self_id: i64,
    primary_id: i64,
) -> Result<LagSample> {
    primary.harvest_pending().await;

    let (received, applied) = local.standby_locations().await?;
    let primary_lsn = primary.primary_location().await?;

    let sample = LagSample::measure(primary_id, self_id, primary_lsn, received, applied);

    let sql = format!(
        "INSERT INTO {} (primary_node, standby_node, ts, primary_lsn, standby_received_lsn, standby_applied_lsn, receive_lag_bytes, apply_lag_bytes)
         VALUES ({}, {}, '{}', '{}', '{}', '{}', {}, {})",
        config.monitor_table(),
        sample.primary_node,
        sample.standby_node,
        Utc::now().to_rfc3339(),
        sample.primary_lsn.format(),
        sample.standby_received_lsn.format(),
        sample.standby_applied_lsn.format(),
        sample.receive_lag_bytes,
        sample.apply_lag_bytes,
    );
    primary.send_async(&sql).await;

    Ok(sample)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn healthy_tick_computes_lag_bytes() {
        let primary = Lsn::parse("0/1000000").unwrap();
        let received = Lsn::parse("0/0F00000").unwrap();
        let applied = Lsn::parse("0/0E00000").unwrap();

        let sample = LagSample::measure(1, 2, primary, received, applied);
        assert_eq!(sample.receive_lag_bytes, 0x100000);
        assert_eq!(sample.apply_lag_bytes, 0x100000);
    }

    #[test]
    fn lag_never_goes_negative() {
        let primary = Lsn::parse("0/100").unwrap();
        let received = Lsn::parse("0/200").unwrap();
        let applied = Lsn::parse("0/300").unwrap();

        let sample = LagSample::measure(1, 2, primary, received, applied);
        assert_eq!(sample.receive_lag_bytes, 0);
        assert_eq!(sample.apply_lag_bytes, 0);
    }
}
