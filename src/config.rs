//! Daemon configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Failover handling mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FailoverMode {
    /// Wait for an operator to promote a peer.
    Manual,
    /// Run the election and promote a peer automatically.
    Automatic,
}

/// Top level daemon configuration, loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Unique node identifier within the cluster.
    pub node: i64,

    /// Logical cluster name; scopes the registry tables.
    pub cluster_name: String,

    /// Connection string this daemon uses to reach its local database.
    pub conninfo: String,

    /// Failover policy.
    pub failover: FailoverMode,

    /// Shell command run when this node is elected primary.
    pub promote_command: String,

    /// Shell command run when this node should follow a newly elected primary.
    pub follow_command: String,

    /// Prefix for the registry/monitor tables (default "repmgr").
    #[serde(default = "default_schema_prefix")]
    pub schema_prefix: String,

    /// Seconds between monitoring ticks.
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,

    /// Log level directive (e.g. "info", "debug").
    #[serde(default = "default_loglevel")]
    pub loglevel: String,

    /// Log facility tag attached to emitted events.
    #[serde(default = "default_logfacility")]
    pub logfacility: String,
}

fn default_schema_prefix() -> String {
    "repmgr".to_string()
}

fn default_tick_interval_secs() -> u64 {
    3
}

fn default_loglevel() -> String {
    "info".to_string()
}

fn default_logfacility() -> String {
    "local0".to_string()
}

impl DaemonConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load configuration from a TOML string.
    pub fn from_str(content: &str) -> crate::Result<Self> {
        let config: DaemonConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> crate::Result<()> {
        if self.conninfo.is_empty() {
            return Err(crate::Error::Config("conninfo cannot be empty".into()));
        }
        if self.cluster_name.is_empty() {
            return Err(crate::Error::Config("cluster_name cannot be empty".into()));
        }
        if self.promote_command.is_empty() {
            return Err(crate::Error::Config("promote_command cannot be empty".into()));
        }
        if self.follow_command.is_empty() {
            return Err(crate::Error::Config("follow_command cannot be empty".into()));
        }
        if self.tick_interval_secs == 0 {
            return Err(crate::Error::Config("tick_interval_secs must be > 0".into()));
        }
        Ok(())
    }

    /// Interval between monitoring ticks, as a `Duration`.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    pub fn nodes_table(&self) -> String {
        format!("{}_nodes", self.schema_prefix)
    }

    pub fn status_table(&self) -> String {
        format!("{}_status", self.schema_prefix)
    }

    pub fn monitor_table(&self) -> String {
        format!("{}_monitor", self.schema_prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml = r#"
node = 1
cluster_name = "main"
conninfo = "host=localhost dbname=app user=repl"
failover = "AUTOMATIC"
promote_command = "/usr/local/bin/promote.sh"
follow_command = "/usr/local/bin/follow.sh %n"
"#;

        let config = DaemonConfig::from_str(toml).unwrap();
        assert_eq!(config.node, 1);
        assert_eq!(config.failover, FailoverMode::Automatic);
        assert_eq!(config.schema_prefix, "repmgr");
        assert_eq!(config.tick_interval_secs, 3);
        assert_eq!(config.nodes_table(), "repmgr_nodes");
    }

    #[test]
    fn test_validate_rejects_empty_conninfo() {
        let toml = r#"
node = 1
cluster_name = "main"
conninfo = ""
failover = "MANUAL"
promote_command = "true"
follow_command = "true"
"#;
        assert!(DaemonConfig::from_str(toml).is_err());
    }
}
