//! SQLite entry store implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use std::path::Path;
use tokio_rusqlite::Connection;
use tracing::debug;

use deferq_queue::{EntryStore, NewEntry, QueueEntry, QueueError};

use crate::schema::init_schema;

#[cfg(test)]
#[path = "backend_tests.rs"]
mod tests;

const SELECT_COLUMNS: &str =
    "SELECT id, target_kind, target_id, action, tombstoned, created_at, due_at, executed_at
     FROM queue_entries";

/// Rows per `IN (...)` list when deleting by target id.
const DELETE_CHUNK: usize = 500;

/// SQLite-based entry store.
pub struct SqliteEntryStore {
    conn: Connection,
}

impl SqliteEntryStore {
    /// Create a new in-memory database.
    pub async fn in_memory() -> Result<Self, QueueError> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| QueueError::Database(e.to_string()))?;
        Self::init(conn).await
    }

    /// Open (or create) a file-backed database, creating parent directories.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, QueueError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| QueueError::Database(format!("{}: {}", parent.display(), e)))?;
        }

        let conn = Connection::open(&path)
            .await
            .map_err(|e| QueueError::Database(e.to_string()))?;
        debug!("Opened queue database at {}", path.display());
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self, QueueError> {
        conn.call(|conn| Ok(init_schema(conn)?))
            .await
            .map_err(|e| QueueError::Database(e.to_string()))?;

        Ok(Self { conn })
    }
}

fn to_micros(time: DateTime<Utc>) -> i64 {
    time.timestamp_micros()
}

fn from_micros(column: usize, micros: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(column, micros))
}

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<QueueEntry> {
    let executed_at: Option<i64> = row.get(7)?;
    Ok(QueueEntry {
        id: row.get(0)?,
        target_kind: row.get(1)?,
        target_id: row.get(2)?,
        action: row.get(3)?,
        tombstoned: row.get(4)?,
        created_at: from_micros(5, row.get(5)?)?,
        due_at: from_micros(6, row.get(6)?)?,
        executed_at: executed_at.map(|v| from_micros(7, v)).transpose()?,
    })
}

#[async_trait]
impl EntryStore for SqliteEntryStore {
    async fn insert(&self, entries: Vec<NewEntry>) -> Result<Vec<QueueEntry>, QueueError> {
        if entries.is_empty() {
            return Ok(Vec::new());
        }

        let inserted = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let mut inserted = Vec::with_capacity(entries.len());
                {
                    let mut stmt = tx.prepare(
                        "INSERT INTO queue_entries
                         (target_kind, target_id, action, tombstoned, created_at, due_at, executed_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL)",
                    )?;
                    for new in entries {
                        stmt.execute(params![
                            new.target_kind,
                            new.target_id,
                            new.action,
                            new.tombstoned,
                            to_micros(new.created_at),
                            to_micros(new.due_at),
                        ])?;
                        let id = tx.last_insert_rowid();
                        inserted.push(new.into_entry(id));
                    }
                }
                tx.commit()?;
                Ok(inserted)
            })
            .await
            .map_err(|e| QueueError::Database(e.to_string()))?;

        debug!("Inserted {} entries", inserted.len());
        Ok(inserted)
    }

    async fn load(&self, id: i64) -> Result<Option<QueueEntry>, QueueError> {
        self.conn
            .call(move |conn| {
                let sql = format!("{} WHERE id = ?1", SELECT_COLUMNS);
                let entry = conn.query_row(&sql, [id], row_to_entry).optional()?;
                Ok(entry)
            })
            .await
            .map_err(|e| QueueError::Database(e.to_string()))
    }

    async fn delete_pending(&self, kind: &str, ids: &[i64]) -> Result<usize, QueueError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let kind = kind.to_string();
        let ids = ids.to_vec();
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let mut deleted = 0;
                for chunk in ids.chunks(DELETE_CHUNK) {
                    let placeholders = (0..chunk.len())
                        .map(|i| format!("?{}", i + 2))
                        .collect::<Vec<_>>()
                        .join(", ");
                    let sql = format!(
                        "DELETE FROM queue_entries
                         WHERE executed_at IS NULL AND target_kind = ?1 AND target_id IN ({})",
                        placeholders
                    );

                    let mut values = Vec::with_capacity(chunk.len() + 1);
                    values.push(Value::Text(kind.clone()));
                    values.extend(chunk.iter().map(|id| Value::Integer(*id)));
                    deleted += tx.execute(&sql, params_from_iter(values))?;
                }
                tx.commit()?;
                Ok(deleted)
            })
            .await
            .map_err(|e| QueueError::Database(e.to_string()))
    }

    async fn due(&self, now: DateTime<Utc>) -> Result<Vec<QueueEntry>, QueueError> {
        let now = to_micros(now);
        self.conn
            .call(move |conn| {
                let sql = format!(
                    "{} WHERE executed_at IS NULL AND due_at <= ?1 ORDER BY due_at, id",
                    SELECT_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let entries = stmt
                    .query_map([now], row_to_entry)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(entries)
            })
            .await
            .map_err(|e| QueueError::Database(e.to_string()))
    }

    async fn update(&self, entry: &QueueEntry) -> Result<(), QueueError> {
        let entry = entry.clone();
        let id = entry.id;
        let changed = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    "UPDATE queue_entries SET target_kind = ?1, target_id = ?2, action = ?3,
                     tombstoned = ?4, created_at = ?5, due_at = ?6, executed_at = ?7
                     WHERE id = ?8",
                    params![
                        entry.target_kind,
                        entry.target_id,
                        entry.action,
                        entry.tombstoned,
                        to_micros(entry.created_at),
                        to_micros(entry.due_at),
                        entry.executed_at.map(to_micros),
                        entry.id,
                    ],
                )?;
                Ok(changed)
            })
            .await
            .map_err(|e| QueueError::Database(e.to_string()))?;

        if changed == 0 {
            return Err(QueueError::EntryNotFound(id));
        }
        Ok(())
    }

    async fn count_pending(&self) -> Result<usize, QueueError> {
        let count: i64 = self
            .conn
            .call(|conn| {
                Ok(conn.query_row(
                    "SELECT COUNT(*) FROM queue_entries WHERE executed_at IS NULL",
                    [],
                    |row| row.get(0),
                )?)
            })
            .await
            .map_err(|e| QueueError::Database(e.to_string()))?;
        Ok(count as usize)
    }

    async fn count_executed(&self, before: Option<DateTime<Utc>>) -> Result<usize, QueueError> {
        let before = before.map(to_micros);
        let count: i64 = self
            .conn
            .call(move |conn| {
                Ok(conn.query_row(
                    "SELECT COUNT(*) FROM queue_entries
                     WHERE executed_at IS NOT NULL AND (?1 IS NULL OR executed_at <= ?1)",
                    [before],
                    |row| row.get(0),
                )?)
            })
            .await
            .map_err(|e| QueueError::Database(e.to_string()))?;
        Ok(count as usize)
    }

    async fn delete_executed(&self, before: Option<DateTime<Utc>>) -> Result<usize, QueueError> {
        let before = before.map(to_micros);
        let deleted = self
            .conn
            .call(move |conn| {
                Ok(conn.execute(
                    "DELETE FROM queue_entries
                     WHERE executed_at IS NOT NULL AND (?1 IS NULL OR executed_at <= ?1)",
                    [before],
                )?)
            })
            .await
            .map_err(|e| QueueError::Database(e.to_string()))?;

        debug!("Deleted {} executed entries", deleted);
        Ok(deleted)
    }
}
