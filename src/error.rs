//! Error types and process exit codes.

use thiserror::Error;

/// Result type alias for daemon operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Daemon error types.
#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("query execution failed: {0}")]
    QueryExecution(String),

    #[error("malformed LSN text: {0}")]
    BadLsn(String),

    #[error("no primary reachable for cluster {0}")]
    NoPrimary(String),

    #[error("node not found: {0}")]
    NodeNotFound(i64),

    #[error("quorum not reached: {visible}/{total} visible")]
    QuorumNotReached { visible: usize, total: usize },

    #[error("connection failed to {address}: {reason}")]
    ConnectionFailed { address: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("local node is no longer a standby")]
    Promoted,

    #[error("operation cancelled")]
    Cancelled,

    #[error("shutdown in progress")]
    ShuttingDown,
}

impl Error {
    /// Whether this error is expected to clear itself on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Database(_) | Error::ConnectionFailed { .. } | Error::QueryExecution(_)
        )
    }
}

/// Process exit codes, matching the daemon's external contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    BadConfig = 1,
    DbCon = 2,
    DbQuery = 3,
    BadQuery = 4,
    Promoted = 5,
    FailoverFail = 6,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Maps a top-level daemon error to the exit code it should terminate with.
///
/// Only a handful of error kinds are ever fatal at this boundary; everything
/// else is handled (logged and retried) inside the tick loop and never
/// reaches `main`.
pub fn exit_code_for(err: &Error) -> ExitCode {
    match err {
        Error::Config(_) | Error::ConfigParse(_) => ExitCode::BadConfig,
        Error::Promoted => ExitCode::Promoted,
        Error::QuorumNotReached { .. } => ExitCode::FailoverFail,
        Error::BadLsn(_) | Error::QueryExecution(_) => ExitCode::DbQuery,
        Error::Database(_) | Error::ConnectionFailed { .. } | Error::NoPrimary(_) => {
            ExitCode::DbCon
        }
        _ => ExitCode::DbCon,
    }
}
