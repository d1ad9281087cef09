//! Durable upload queue backed by SQLite.
//!
//! Persists each in-flight upload's identity, payload reference, and
//! progress so an interrupted session can be discovered on next startup.
//! Records are keyed by upload item id and removed only on terminal
//! success or explicit discard. This layer holds no retry policy;
//! resumption is the caller's concern.

use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use tracing::{debug, warn};

use vitrine_core::{Error, PayloadRef, Result, UploadItemId};

/// One persisted upload record, as returned by the startup recovery scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedUpload {
    pub item_id: UploadItemId,
    pub payload: PayloadRef,
    /// Last persisted progress percentage (best-effort, may lag in-memory).
    pub progress: u8,
    pub enqueued_at: DateTime<Utc>,
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS upload_queue (
    item_id     TEXT PRIMARY KEY,
    payload     TEXT NOT NULL,
    progress    INTEGER NOT NULL DEFAULT 0,
    enqueued_at TEXT NOT NULL
)";

/// Durable upload queue.
///
/// The connection is shared behind a mutex and every operation runs on the
/// blocking thread pool, so calls are safe from the async runtime.
#[derive(Clone)]
pub struct UploadQueue {
    conn: Arc<Mutex<Connection>>,
}

impl UploadQueue {
    /// Open (or create) the queue database at the given path.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = tokio::task::spawn_blocking(move || -> Result<Connection> {
            let conn = Connection::open(path)?;
            conn.execute(SCHEMA, [])?;
            Ok(conn)
        })
        .await
        .map_err(|e| Error::Internal(format!("store open task failed: {e}")))??;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory queue (tests, ephemeral sessions).
    pub async fn open_in_memory() -> Result<Self> {
        let conn = tokio::task::spawn_blocking(|| -> Result<Connection> {
            let conn = Connection::open_in_memory()?;
            conn.execute(SCHEMA, [])?;
            Ok(conn)
        })
        .await
        .map_err(|e| Error::Internal(format!("store open task failed: {e}")))??;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a closure against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || -> Result<T> {
            let conn = conn
                .lock()
                .map_err(|_| Error::Internal("store mutex poisoned".into()))?;
            f(&conn).map_err(Error::from)
        })
        .await
        .map_err(|e| Error::Internal(format!("store task failed: {e}")))?
    }

    /// Persist a record for an item entering the pipeline.
    ///
    /// Must complete before byte extraction begins, so a crash mid-extraction
    /// cannot lose the payload reference.
    pub async fn enqueue(
        &self,
        item_id: UploadItemId,
        payload: &PayloadRef,
        initial_progress: u8,
    ) -> Result<()> {
        let payload_json = serde_json::to_string(payload)?;
        let enqueued_at = Utc::now().to_rfc3339();
        let key = item_id.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO upload_queue (item_id, payload, progress, enqueued_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![key, payload_json, initial_progress as i64, enqueued_at],
            )
            .map(|_| ())
        })
        .await?;
        debug!(item_id = %item_id, "Upload record persisted");
        Ok(())
    }

    /// Update the persisted progress field, best-effort.
    ///
    /// Progress writers race each other, so the stored value only ever
    /// moves forward; a stale report can never lower it.
    ///
    /// Persistence failures are logged and swallowed; they never block or
    /// fail the in-memory upload path.
    pub async fn update_progress(&self, item_id: UploadItemId, progress: u8) {
        let key = item_id.to_string();
        let result = self
            .with_conn(move |conn| {
                conn.execute(
                    "UPDATE upload_queue SET progress = MAX(progress, ?2) WHERE item_id = ?1",
                    params![key, progress.min(100) as i64],
                )
                .map(|_| ())
            })
            .await;
        if let Err(e) = result {
            warn!(item_id = %item_id, error = %e, "Failed to persist upload progress");
        }
    }

    /// Remove a record on terminal success or explicit discard.
    pub async fn dequeue(&self, item_id: UploadItemId) -> Result<()> {
        let key = item_id.to_string();
        let removed = self
            .with_conn(move |conn| {
                conn.execute("DELETE FROM upload_queue WHERE item_id = ?1", params![key])
            })
            .await?;
        debug!(item_id = %item_id, removed, "Upload record dequeued");
        Ok(())
    }

    /// Startup recovery scan: every record that was mid-flight when the
    /// previous session ended, oldest first.
    pub async fn pending(&self) -> Result<Vec<QueuedUpload>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT item_id, payload, progress, enqueued_at
                 FROM upload_queue ORDER BY enqueued_at ASC",
            )?;
            let rows = stmt.query_map([], |row| {
                let item_id: String = row.get(0)?;
                let payload: String = row.get(1)?;
                let progress: i64 = row.get(2)?;
                let enqueued_at: String = row.get(3)?;
                Ok((item_id, payload, progress, enqueued_at))
            })?;

            let mut records = Vec::new();
            for row in rows {
                records.push(row?);
            }
            Ok(records)
        })
        .await?
        .into_iter()
        .map(|(item_id, payload, progress, enqueued_at)| {
            Ok(QueuedUpload {
                item_id: item_id.parse()?,
                payload: serde_json::from_str(&payload)?,
                progress: progress.clamp(0, 100) as u8,
                enqueued_at: enqueued_at
                    .parse::<DateTime<Utc>>()
                    .map_err(|e| Error::Store(format!("bad enqueued_at timestamp: {e}")))?,
            })
        })
        .collect()
    }

    /// Number of persisted records.
    pub async fn len(&self) -> Result<usize> {
        let count: i64 = self
            .with_conn(|conn| {
                conn.query_row("SELECT COUNT(*) FROM upload_queue", [], |row| row.get(0))
            })
            .await?;
        Ok(count as usize)
    }

    /// Whether the queue holds no records.
    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }
}
