//! repld - replication monitor and automatic failover daemon.
//!
//! One instance runs alongside each standby in a primary/standby database
//! cluster. It measures replication lag against the primary, detects
//! primary loss, and (when configured for automatic failover) runs a
//! quorum-based election among surviving standbys before promoting one of
//! them and re-pointing the rest.

pub mod command;
pub mod config;
pub mod directory;
pub mod elector;
pub mod error;
pub mod lag;
pub mod lsn;
pub mod node;
pub mod orchestrator;
pub mod schema;
pub mod supervisor;

pub use config::DaemonConfig;
pub use error::{Error, Result};
