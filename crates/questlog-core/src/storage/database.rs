//! SQLite-based snapshot storage and event history.
//!
//! Provides persistent storage for:
//! - The latest engine snapshot (one row)
//! - An append-only log of engine events

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{data_dir, migrations, Snapshot, StateStore};
use crate::error::StoreError;
use crate::events::Event;

/// A stored event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub kind: String,
    pub event: Event,
    pub recorded_at: DateTime<Utc>,
}

/// SQLite database for engine state.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at `~/.config/questlog/questlog.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, StoreError> {
        Self::open_at(&data_dir()?.join("questlog.db"))
    }

    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_at(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|source| StoreError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        migrations::migrate(&db.conn)?;
        Ok(db)
    }

    /// Open an in-memory database.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub fn open_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        migrations::migrate(&db.conn)?;
        Ok(db)
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Append events to the history log.
    ///
    /// # Errors
    /// Returns an error if encoding or the insert fails; nothing is written
    /// in that case.
    pub fn append_events(&self, events: &[Event], recorded_at: DateTime<Utc>) -> Result<usize, StoreError> {
        if events.is_empty() {
            return Ok(0);
        }
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO event_log (kind, body, recorded_at) VALUES (?1, ?2, ?3)",
            )?;
            for event in events {
                let body = serde_json::to_string(event)?;
                stmt.execute(params![event.kind(), body, recorded_at.to_rfc3339()])?;
            }
        }
        tx.commit()?;
        Ok(events.len())
    }

    /// Most recent events first.
    ///
    /// # Errors
    /// Returns an error if the query fails or a row cannot be decoded.
    pub fn history(&self, limit: usize, kind: Option<&str>) -> Result<Vec<HistoryEntry>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = self.conn.prepare(
            "SELECT id, kind, body, recorded_at FROM event_log
             WHERE (?1 IS NULL OR kind = ?1)
             ORDER BY id DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![kind, limit], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (id, kind, body, recorded_at) = row?;
            let recorded_at = DateTime::parse_from_rfc3339(&recorded_at)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| StoreError::CorruptEntry {
                    id,
                    message: format!("recorded_at '{recorded_at}': {e}"),
                })?;
            entries.push(HistoryEntry {
                id,
                kind,
                event: serde_json::from_str(&body)?,
                recorded_at,
            });
        }
        Ok(entries)
    }
}

impl StateStore for Database {
    fn load(&self) -> Result<Option<Snapshot>, StoreError> {
        let body: Option<String> = self
            .conn
            .query_row("SELECT body FROM state WHERE id = 1", [], |row| row.get(0))
            .optional()?;
        body.as_deref().map(Snapshot::from_json).transpose()
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let body = snapshot.to_json()?;
        self.conn.execute(
            "INSERT OR REPLACE INTO state (id, version, body, saved_at) VALUES (1, ?1, ?2, ?3)",
            params![snapshot.version, body, snapshot.saved_at.to_rfc3339()],
        )?;
        Ok(())
    }
}
