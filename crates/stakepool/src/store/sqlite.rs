//! SQLite store of engine snapshots. Each save appends a row; the newest row is current.

use crate::snapshot::{Snapshot, SnapshotError};
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot: {0}")]
    Snapshot(#[from] SnapshotError),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Row metadata for a stored snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredSnapshot {
    pub id: i64,
    pub state_hash: String,
    pub created_utc: i64,
}

pub struct StateStore {
    conn: Mutex<Connection>,
}

impl StateStore {
    /// Open or create the store at `path`. Creates parent dirs if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS snapshots (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                state_hash TEXT NOT NULL,
                body BLOB NOT NULL,
                created_utc INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_snapshots_hash ON snapshots(state_hash);
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Io(std::io::Error::other(e.to_string())))
    }

    /// Append a snapshot. Returns its row id.
    pub fn save(&self, snapshot: &Snapshot) -> Result<i64, StoreError> {
        let body = serde_json::to_vec(snapshot)?;
        let created = time::OffsetDateTime::now_utc().unix_timestamp();
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO snapshots (state_hash, body, created_utc) VALUES (?1, ?2, ?3)",
            rusqlite::params![snapshot.state_hash, body, created],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Newest snapshot, or None for an empty store.
    pub fn load_latest(&self) -> Result<Option<Snapshot>, StoreError> {
        let conn = self.conn()?;
        let body = conn
            .query_row(
                "SELECT body FROM snapshots ORDER BY id DESC LIMIT 1",
                [],
                |r| r.get::<_, Vec<u8>>(0),
            )
            .optional()?;
        drop(conn);
        body.map(|b| Self::decode(&b)).transpose()
    }

    /// Most recent snapshot recorded with `state_hash`.
    pub fn load_by_hash(&self, state_hash: &str) -> Result<Option<Snapshot>, StoreError> {
        let conn = self.conn()?;
        let body = conn
            .query_row(
                "SELECT body FROM snapshots WHERE state_hash = ?1 ORDER BY id DESC LIMIT 1",
                [state_hash],
                |r| r.get::<_, Vec<u8>>(0),
            )
            .optional()?;
        drop(conn);
        body.map(|b| Self::decode(&b)).transpose()
    }

    /// Stored snapshots, newest first.
    pub fn history(&self, limit: usize) -> Result<Vec<StoredSnapshot>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, state_hash, created_utc FROM snapshots ORDER BY id DESC LIMIT ?1",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map([limit], |r| {
            Ok(StoredSnapshot {
                id: r.get(0)?,
                state_hash: r.get(1)?,
                created_utc: r.get(2)?,
            })
        })?;
        let snapshots = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(snapshots)
    }

    fn decode(body: &[u8]) -> Result<Snapshot, StoreError> {
        let json = std::str::from_utf8(body)
            .map_err(|e| StoreError::Io(std::io::Error::other(e.to_string())))?;
        Ok(Snapshot::from_json(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::custody::Vault;
    use crate::engine::LedgerState;
    use crate::ids::AssetId;
    use tempfile::NamedTempFile;

    #[test]
    fn empty_store_has_no_snapshot() {
        let store = StateStore::open_in_memory().unwrap();
        assert!(store.load_latest().unwrap().is_none());
        assert!(store.history(10).unwrap().is_empty());
    }

    #[test]
    fn latest_wins() {
        let tmp = NamedTempFile::new().unwrap();
        let store = StateStore::open(tmp.path()).unwrap();
        let first = Snapshot::new(LedgerState::default(), Vault::default()).unwrap();
        let mut vault = Vault::default();
        vault.fund_reserve(&AssetId::new("RWD"), 5).unwrap();
        let second = Snapshot::new(LedgerState::default(), vault).unwrap();
        store.save(&first).unwrap();
        store.save(&second).unwrap();

        let latest = store.load_latest().unwrap().unwrap();
        assert_eq!(latest.state_hash, second.state_hash);
        assert_eq!(latest.vault.reserve(&AssetId::new("RWD")), 5);

        let old = store.load_by_hash(&first.state_hash).unwrap().unwrap();
        assert_eq!(old.vault, Vault::default());
        let history = store.history(10).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].state_hash, second.state_hash);
    }

    #[test]
    fn reopen_persists() {
        let tmp = NamedTempFile::new().unwrap();
        let hash = {
            let store = StateStore::open(tmp.path()).unwrap();
            let snap = Snapshot::new(LedgerState::default(), Vault::default()).unwrap();
            store.save(&snap).unwrap();
            snap.state_hash
        };
        let store = StateStore::open(tmp.path()).unwrap();
        assert_eq!(store.load_latest().unwrap().unwrap().state_hash, hash);
    }
}
