//! External shell command execution.
//!
//! `promote_command` and `follow_command` are opaque operator-supplied
//! strings, passed to the shell verbatim. No argument splitting is performed
//! here; the operator is responsible for quoting within the command string.

use std::process::Stdio;
use tokio::process::Command;

use crate::error::Result;

/// Run `cmd` via `sh -c`, waiting for completion. The exit status is logged
/// but not treated as fatal by the caller — the core loop does not second
/// guess an operator-supplied script.
pub async fn run(cmd: &str) -> Result<std::process::ExitStatus> {
    tracing::info!(command = cmd, "executing external command");
    let status = Command::new("sh")
        .arg("-c")
        .arg(cmd)
        .stdin(Stdio::null())
        .status()
        .await?;

    if status.success() {
        tracing::info!(command = cmd, "external command succeeded");
    } else {
        tracing::warn!(command = cmd, code = ?status.code(), "external command exited non-zero");
    }

    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn runs_verbatim_through_shell() {
        let status = run("exit 0").await.unwrap();
        assert!(status.success());
    }

    #[tokio::test]
    async fn reports_nonzero_exit_without_erroring() {
        let status = run("exit 7").await.unwrap();
        assert_eq!(status.code(), Some(7));
    }

    #[tokio::test]
    async fn does_not_split_arguments() {
        let status = run("test 'a b' = 'a b'").await.unwrap();
        assert!(status.success());
    }
}
