//! Node client: a thin single-session database connection.
//!
//! Mirrors the connect/health-check/reconnect shape of a pooled executor, but
//! models exactly one logical session per remote node (primary, local, or a
//! transient peer probed during an election) together with at most one
//! outstanding asynchronous query.

use std::sync::Arc;
use std::time::Duration;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::lsn::Lsn;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Session status, analogous to `PQstatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Broken,
}

struct PendingQuery {
    handle: JoinHandle<Result<u64>>,
}

/// A single-connection session against one database node.
pub struct NodeClient {
    conninfo: String,
    pool: Arc<RwLock<Option<PgPool>>>,
    pending: Mutex<Option<PendingQuery>>,
}

impl NodeClient {
    /// Open a session. If `required` and the connection fails, the error is
    /// returned to the caller to treat as fatal; if not required, a broken
    /// (closed) session is returned instead so callers can retry later.
    pub async fn open(conninfo: &str, required: bool) -> Result<Self> {
        match Self::connect(conninfo).await {
            Ok(pool) => Ok(Self {
                conninfo: conninfo.to_string(),
                pool: Arc::new(RwLock::new(Some(pool))),
                pending: Mutex::new(None),
            }),
            Err(e) => {
                if required {
                    Err(e)
                } else {
                    Ok(Self {
                        conninfo: conninfo.to_string(),
                        pool: Arc::new(RwLock::new(None)),
                        pending: Mutex::new(None),
                    })
                }
            }
        }
    }

    async fn connect(conninfo: &str) -> Result<PgPool> {
        PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(CONNECT_TIMEOUT)
            .connect(conninfo)
            .await
            .map_err(|e| Error::ConnectionFailed {
                address: conninfo.to_string(),
                reason: e.to_string(),
            })
    }

    /// Current session status.
    pub async fn status(&self) -> Status {
        if self.pool.read().await.is_some() {
            Status::Ok
        } else {
            Status::Broken
        }
    }

    /// Best-effort reconnect. Never fails loudly; returns the resulting
    /// status so callers can decide whether to keep retrying.
    pub async fn reset(&self) -> Status {
        self.cancel_in_flight().await;
        match Self::connect(&self.conninfo).await {
            Ok(pool) => {
                *self.pool.write().await = Some(pool);
                Status::Ok
            }
            Err(e) => {
                tracing::warn!(conninfo = %self.conninfo, error = %e, "reconnect failed");
                *self.pool.write().await = None;
                Status::Broken
            }
        }
    }

    /// Whether an async query is still in flight.
    pub async fn is_busy(&self) -> bool {
        match self.pending.lock().await.as_ref() {
            Some(p) => !p.handle.is_finished(),
            None => false,
        }
    }

    /// Abort any in-flight async query without waiting for its result.
    pub async fn cancel_in_flight(&self) {
        if let Some(p) = self.pending.lock().await.take() {
            p.handle.abort();
        }
    }

    /// Drain a finished async query's result, or cancel it if still running.
    /// Call this at the start of each tick before issuing new queries.
    pub async fn harvest_pending(&self) {
        let pending = self.pending.lock().await.take();
        if let Some(p) = pending {
            if p.handle.is_finished() {
                match p.handle.await {
                    Ok(Ok(rows)) => tracing::debug!(rows, "async query completed"),
                    Ok(Err(e)) => tracing::warn!(error = %e, "async query failed"),
                    Err(e) => tracing::warn!(error = %e, "async query task panicked"),
                }
            } else {
                p.handle.abort();
            }
        }
    }

    /// Execute a statement and return the affected row count.
    pub async fn exec(&self, sql: &str) -> Result<u64> {
        let guard = self.pool.read().await;
        let pool = guard.as_ref().ok_or_else(|| Error::ConnectionFailed {
            address: self.conninfo.clone(),
            reason: "no open session".to_string(),
        })?;
        let result = sqlx::query(sql).execute(pool).await?;
        Ok(result.rows_affected())
    }

    /// Run a query with a single text bind parameter and return the raw rows.
    /// Used by the directory module, which needs to decode columns itself.
    pub async fn fetch_rows(&self, sql: &str, param: &str) -> Result<Vec<sqlx::postgres::PgRow>> {
        let guard = self.pool.read().await;
        let pool = guard.as_ref().ok_or_else(|| Error::ConnectionFailed {
            address: self.conninfo.clone(),
            reason: "no open session".to_string(),
        })?;
        let rows = sqlx::query(sql).bind(param).fetch_all(pool).await?;
        Ok(rows)
    }

    /// Fire-and-forget a statement; its result is harvested on a later tick.
    pub async fn send_async(&self, sql: &str) {
        let pool = Arc::clone(&self.pool);
        let sql = sql.to_string();
        let handle = tokio::spawn(async move {
            let guard = pool.read().await;
            let pool = guard.as_ref().ok_or_else(|| Error::ConnectionFailed {
                address: "unknown".to_string(),
                reason: "no open session".to_string(),
            })?;
            let result = sqlx::query(&sql).execute(pool).await?;
            Ok(result.rows_affected())
        });
        *self.pending.lock().await = Some(PendingQuery { handle });
    }

    /// Read this node's received/replayed WAL positions.
    pub async fn standby_locations(&self) -> Result<(Lsn, Lsn)> {
        let guard = self.pool.read().await;
        let pool = guard.as_ref().ok_or_else(|| Error::ConnectionFailed {
            address: self.conninfo.clone(),
            reason: "no open session".to_string(),
        })?;
        let row = sqlx::query(
            "SELECT pg_last_xlog_receive_location()::text, pg_last_xlog_replay_location()::text",
        )
        .fetch_one(pool)
        .await?;
        let received: String = row.try_get(0)?;
        let applied: String = row.try_get(1)?;
        Ok((Lsn::parse(&received)?, Lsn::parse(&applied)?))
    }

    /// Read the primary's current write position.
    pub async fn primary_location(&self) -> Result<Lsn> {
        let guard = self.pool.read().await;
        let pool = guard.as_ref().ok_or_else(|| Error::ConnectionFailed {
            address: self.conninfo.clone(),
            reason: "no open session".to_string(),
        })?;
        let row: (String,) = sqlx::query_as("SELECT pg_current_xlog_location()::text")
            .fetch_one(pool)
            .await?;
        Lsn::parse(&row.0)
    }

    /// Whether this node is currently a standby.
    pub async fn is_standby(&self) -> Result<bool> {
        let guard = self.pool.read().await;
        let pool = guard.as_ref().ok_or_else(|| Error::ConnectionFailed {
            address: self.conninfo.clone(),
            reason: "no open session".to_string(),
        })?;
        let row: (bool,) = sqlx::query_as("SELECT is_standby()").fetch_one(pool).await?;
        Ok(row.0)
    }

    /// Read this node's last published standby location, as recorded by a
    /// prior `publish_standby_location` call (possibly from this node or a
    /// peer reading it back). Issues the pre-installed
    /// `repmgr_get_last_standby_location()` predicate.
    pub async fn published_standby_location(&self) -> Result<Lsn> {
        let guard = self.pool.read().await;
        let pool = guard.as_ref().ok_or_else(|| Error::ConnectionFailed {
            address: self.conninfo.clone(),
            reason: "no open session".to_string(),
        })?;
        let row: (String,) = sqlx::query_as("SELECT repmgr_get_last_standby_location()::text")
            .fetch_one(pool)
            .await?;
        Lsn::parse(&row.0)
    }

    /// Close the session.
    pub async fn close(&self) {
        self.cancel_in_flight().await;
        if let Some(pool) = self.pool.write().await.take() {
            pool.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_non_required_survives_bad_conninfo() {
        let client = NodeClient::open("postgres://nobody@127.0.0.1:1/nonexistent", false)
            .await
            .unwrap();
        assert_eq!(client.status().await, Status::Broken);
    }

    #[tokio::test]
    async fn open_required_propagates_error() {
        let result = NodeClient::open("postgres://nobody@127.0.0.1:1/nonexistent", true).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn is_busy_false_with_no_pending_query() {
        let client = NodeClient::open("postgres://nobody@127.0.0.1:1/nonexistent", false)
            .await
            .unwrap();
        assert!(!client.is_busy().await);
    }
}
