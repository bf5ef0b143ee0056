//! Local SQLite storage for the sync ledger and run history.
//!
//! The ledger is kept as a single JSON document in a key-value table and is
//! always read and written whole.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::domain::{AppError, LedgerStore, Result, RunRecord, SyncLedger};

/// Key of the ledger record in the key-value table.
const LEDGER_KEY: &str = "sync_ledger";

/// Local storage repository using SQLite.
pub struct LocalStorage {
    conn: Connection,
}

impl LocalStorage {
    /// Opens or creates the local storage database.
    ///
    /// # Errors
    /// Returns error if database cannot be opened or schema creation fails.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| AppError::io("Failed to create storage directory", e))?;
        }

        let conn = Connection::open(path).map_err(AppError::database)?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(AppError::database)?;

        let storage = Self { conn };
        storage.init_schema()?;

        Ok(storage)
    }

    /// Opens a throwaway in-memory database.
    ///
    /// # Errors
    /// Returns error if schema creation fails.
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(AppError::database)?;
        let storage = Self { conn };
        storage.init_schema()?;
        Ok(storage)
    }

    /// Initialize database schema.
    fn init_schema(&self) -> Result<()> {
        self.conn
            .execute_batch(
                r"
            -- Named documents, written whole
            CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            -- One row per finished sync run
            CREATE TABLE IF NOT EXISTS sync_runs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                project TEXT NOT NULL,
                destination_id TEXT,
                started_at TEXT NOT NULL,
                finished_at TEXT NOT NULL,
                status TEXT NOT NULL,
                delivered INTEGER NOT NULL DEFAULT 0,
                message TEXT NOT NULL DEFAULT ''
            );

            CREATE INDEX IF NOT EXISTS idx_sync_runs_finished
                ON sync_runs(finished_at DESC);
            ",
            )
            .map_err(AppError::database)?;

        Ok(())
    }

    /// Read a named record.
    pub fn get_value(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row("SELECT value FROM kv_store WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()
            .map_err(AppError::database)
    }

    /// Write a named record, replacing any previous value.
    pub fn put_value(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                r"
            INSERT INTO kv_store (key, value) VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = datetime('now')
            ",
                params![key, value],
            )
            .map_err(AppError::database)?;

        Ok(())
    }

    /// Append a finished run to the history.
    pub fn record_run(&self, run: &RunRecord) -> Result<()> {
        self.conn
            .execute(
                r"
            INSERT INTO sync_runs
                (project, destination_id, started_at, finished_at, status, delivered, message)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
                params![
                    &run.project,
                    &run.destination_id,
                    run.started_at.to_rfc3339(),
                    run.finished_at.to_rfc3339(),
                    run.status.as_str(),
                    run.delivered as i64,
                    &run.message,
                ],
            )
            .map_err(AppError::database)?;

        Ok(())
    }

    /// Most recent runs, newest first.
    pub fn recent_runs(&self, limit: usize) -> Result<Vec<RunRecord>> {
        let mut stmt = self
            .conn
            .prepare(
                r"
            SELECT project, destination_id, started_at, finished_at, status, delivered, message
            FROM sync_runs
            ORDER BY id DESC
            LIMIT ?1
            ",
            )
            .map_err(AppError::database)?;

        let rows = stmt
            .query_map([limit as i64], |row| {
                let started_at: String = row.get(2)?;
                let finished_at: String = row.get(3)?;
                let status: String = row.get(4)?;

                Ok(RunRecord {
                    project: row.get(0)?,
                    destination_id: row.get(1)?,
                    started_at: parse_timestamp(&started_at),
                    finished_at: parse_timestamp(&finished_at),
                    status: status
                        .parse()
                        .unwrap_or(crate::domain::RunStatus::Failed),
                    delivered: row.get::<_, i64>(5)? as usize,
                    message: row.get(6)?,
                })
            })
            .map_err(AppError::database)?;

        let mut runs = Vec::new();
        for row in rows {
            match row {
                Ok(run) => runs.push(run),
                Err(e) => tracing::warn!("Failed to read run row: {}", e),
            }
        }

        Ok(runs)
    }

    /// Remove every ledger entry for a destination. Returns how many were removed.
    pub fn forget_destination(&self, destination_id: &str) -> Result<usize> {
        let mut ledger = self.load_ledger()?;
        let removed = ledger.forget_destination(destination_id);
        if removed > 0 {
            self.save_ledger(&ledger)?;
        }
        Ok(removed)
    }
}

impl LedgerStore for LocalStorage {
    fn load_ledger(&self) -> Result<SyncLedger> {
        match self.get_value(LEDGER_KEY)? {
            Some(json) => serde_json::from_str(&json).map_err(AppError::json_parse),
            None => Ok(SyncLedger::default()),
        }
    }

    fn save_ledger(&self, ledger: &SyncLedger) -> Result<()> {
        let json = serde_json::to_string(ledger).map_err(AppError::json_parse)?;
        self.put_value(LEDGER_KEY, &json)?;
        tracing::debug!(entries = ledger.len(), "Ledger saved");
        Ok(())
    }
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    use crate::domain::{Document, MimeType, RunStatus};

    fn doc(id: &str) -> Document {
        Document {
            id: id.into(),
            parent_id: String::new(),
            title: String::new(),
            filename: format!("{id}.pdf"),
            mime_type: MimeType::Pdf,
            fingerprint: format!("hash-{id}"),
            modified_at: "2024-01-01".into(),
        }
    }

    #[test]
    fn test_open_creates_schema() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("nested").join("test.db");

        let storage = LocalStorage::open(&db_path).unwrap();

        let count: i64 = storage
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table'",
                [],
                |row| row.get(0),
            )
            .unwrap();

        assert!(count >= 2);
    }

    #[test]
    fn test_missing_ledger_is_empty() {
        let storage = LocalStorage::open_in_memory().unwrap();
        assert!(storage.load_ledger().unwrap().is_empty());
    }

    #[test]
    fn test_ledger_survives_reopen() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");

        {
            let storage = LocalStorage::open(&db_path).unwrap();
            let mut ledger = SyncLedger::default();
            ledger.commit_batch("nb", &[doc("1"), doc("2")], Utc::now());
            storage.save_ledger(&ledger).unwrap();
        }

        let storage = LocalStorage::open(&db_path).unwrap();
        let ledger = storage.load_ledger().unwrap();
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.get("nb", "2").unwrap().fingerprint, "hash-2");
    }

    #[test]
    fn test_save_replaces_whole_snapshot() {
        let storage = LocalStorage::open_in_memory().unwrap();

        let mut first = SyncLedger::default();
        first.commit_batch("nb", &[doc("1")], Utc::now());
        storage.save_ledger(&first).unwrap();

        let mut second = SyncLedger::default();
        second.commit_batch("other", &[doc("9")], Utc::now());
        storage.save_ledger(&second).unwrap();

        let loaded = storage.load_ledger().unwrap();
        assert_eq!(loaded, second);
    }

    #[test]
    fn test_forget_destination() {
        let storage = LocalStorage::open_in_memory().unwrap();
        let mut ledger = SyncLedger::default();
        ledger.commit_batch("nb", &[doc("1")], Utc::now());
        ledger.commit_batch("keep", &[doc("1")], Utc::now());
        storage.save_ledger(&ledger).unwrap();

        assert_eq!(storage.forget_destination("nb").unwrap(), 1);
        let loaded = storage.load_ledger().unwrap();
        assert!(loaded.get("nb", "1").is_none());
        assert!(loaded.get("keep", "1").is_some());
    }

    #[test]
    fn test_run_history_newest_first() {
        let storage = LocalStorage::open_in_memory().unwrap();
        for (i, status) in [RunStatus::Succeeded, RunStatus::Failed].into_iter().enumerate() {
            storage
                .record_run(&RunRecord {
                    project: format!("p{i}"),
                    destination_id: Some("nb".into()),
                    started_at: Utc::now(),
                    finished_at: Utc::now(),
                    status,
                    delivered: i,
                    message: "done".into(),
                })
                .unwrap();
        }

        let runs = storage.recent_runs(10).unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].project, "p1");
        assert_eq!(runs[0].status, RunStatus::Failed);
        assert_eq!(runs[1].delivered, 0);

        assert_eq!(storage.recent_runs(1).unwrap().len(), 1);
    }
}
