use std::collections::HashMap;
use std::path::Path;

use cideldill_codec::Cid;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::StoreError;

/// Aggregate statistics over all stored entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub count: u64,
    pub total_size_bytes: u64,
}

/// A single row, as returned by [`CidStore::list_entries`].
#[derive(Debug, Clone)]
pub struct StoreEntry {
    pub cid: Cid,
    pub created_at: f64,
    pub size_bytes: u64,
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS cid_data (
    cid TEXT PRIMARY KEY,
    data BLOB NOT NULL,
    created_at REAL NOT NULL,
    size_bytes INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS cid_data_created_at ON cid_data(created_at);
";

/// Content-addressed byte store, implemented by both the SQLite-backed
/// store and its in-memory mode (spec §4.B), so callers that only need
/// storage semantics (the HTTP control plane, the MCP adapter) can depend
/// on `Arc<dyn CidStore>` rather than a concrete backend.
pub trait CidStore: Send + Sync {
    fn store(&self, cid: &Cid, data: &[u8]) -> Result<(), StoreError>;
    fn store_many(&self, items: &[(Cid, Vec<u8>)]) -> Result<(), StoreError>;
    fn get(&self, cid: &Cid) -> Result<Option<Vec<u8>>, StoreError>;
    fn get_many(&self, cids: &[Cid]) -> Result<HashMap<Cid, Vec<u8>>, StoreError>;
    fn exists(&self, cid: &Cid) -> Result<bool, StoreError>;
    fn missing(&self, cids: &[Cid]) -> Result<Vec<Cid>, StoreError>;
    fn stats(&self) -> Result<StoreStats, StoreError>;
    fn list_entries(&self) -> Result<Vec<StoreEntry>, StoreError>;
}

/// Durable mapping `cid -> bytes`, backed by SQLite.
///
/// All mutations and reads serialize on one mutex: `rusqlite::Connection` is
/// not `Sync`, and the protocol's own concurrency model (spec §5) calls for
/// a single short-scoped mutex around the store regardless, so one
/// connection behind one lock is both correct and sufficient.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(SqliteStore { conn: Mutex::new(conn) })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(SqliteStore { conn: Mutex::new(conn) })
    }

    /// Insert `(cid, data)` if absent, verifying the hash first.
    ///
    /// Idempotent: storing the same `(cid, data)` pair again is a no-op and
    /// never errors.
    pub fn store(&self, cid: &Cid, data: &[u8]) -> Result<(), StoreError> {
        if !cid.verify(data) {
            return Err(StoreError::CidMismatch { cid: cid.clone() });
        }
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR IGNORE INTO cid_data (cid, data, created_at, size_bytes) VALUES (?1, ?2, ?3, ?4)",
            params![cid.as_str(), data, now(), data.len() as i64],
        )?;
        Ok(())
    }

    /// Atomically store a batch of `(cid, data)` pairs.
    pub fn store_many(&self, items: &[(Cid, Vec<u8>)]) -> Result<(), StoreError> {
        for (cid, data) in items {
            if !cid.verify(data) {
                return Err(StoreError::CidMismatch { cid: cid.clone() });
            }
        }
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        for (cid, data) in items {
            tx.execute(
                "INSERT OR IGNORE INTO cid_data (cid, data, created_at, size_bytes) VALUES (?1, ?2, ?3, ?4)",
                params![cid.as_str(), data, now(), data.len() as i64],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn get(&self, cid: &Cid) -> Result<Option<Vec<u8>>, StoreError> {
        let conn = self.conn.lock();
        let data = conn
            .query_row("SELECT data FROM cid_data WHERE cid = ?1", params![cid.as_str()], |row| row.get(0))
            .optional()?;
        Ok(data)
    }

    pub fn get_many(&self, cids: &[Cid]) -> Result<HashMap<Cid, Vec<u8>>, StoreError> {
        let mut out = HashMap::with_capacity(cids.len());
        let conn = self.conn.lock();
        for cid in cids {
            let data: Option<Vec<u8>> = conn
                .query_row("SELECT data FROM cid_data WHERE cid = ?1", params![cid.as_str()], |row| row.get(0))
                .optional()?;
            if let Some(data) = data {
                out.insert(cid.clone(), data);
            }
        }
        Ok(out)
    }

    pub fn exists(&self, cid: &Cid) -> Result<bool, StoreError> {
        let conn = self.conn.lock();
        let exists: Option<i64> = conn
            .query_row("SELECT 1 FROM cid_data WHERE cid = ?1", params![cid.as_str()], |row| row.get(0))
            .optional()?;
        Ok(exists.is_some())
    }

    /// Of `cids`, return those not currently present in the store.
    pub fn missing(&self, cids: &[Cid]) -> Result<Vec<Cid>, StoreError> {
        let conn = self.conn.lock();
        let mut missing = Vec::new();
        for cid in cids {
            let exists: Option<i64> = conn
                .query_row("SELECT 1 FROM cid_data WHERE cid = ?1", params![cid.as_str()], |row| row.get(0))
                .optional()?;
            if exists.is_none() {
                missing.push(cid.clone());
            }
        }
        Ok(missing)
    }

    pub fn stats(&self) -> Result<StoreStats, StoreError> {
        let conn = self.conn.lock();
        let (count, total_size_bytes): (i64, Option<i64>) =
            conn.query_row("SELECT COUNT(*), SUM(size_bytes) FROM cid_data", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })?;
        Ok(StoreStats {
            count: count.max(0) as u64,
            total_size_bytes: total_size_bytes.unwrap_or(0).max(0) as u64,
        })
    }

    pub fn list_entries(&self) -> Result<Vec<StoreEntry>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT cid, created_at, size_bytes FROM cid_data ORDER BY created_at ASC")?;
        let rows = stmt.query_map([], |row| {
            let cid_str: String = row.get(0)?;
            let created_at: f64 = row.get(1)?;
            let size_bytes: i64 = row.get(2)?;
            Ok((cid_str, created_at, size_bytes))
        })?;
        let mut entries = Vec::new();
        for row in rows {
            let (cid_str, created_at, size_bytes) = row?;
            let cid = Cid::parse(cid_str).map_err(|_| StoreError::Backend {
                source: rusqlite::Error::InvalidColumnType(0, "cid".into(), rusqlite::types::Type::Text),
            })?;
            entries.push(StoreEntry {
                cid,
                created_at,
                size_bytes: size_bytes.max(0) as u64,
            });
        }
        Ok(entries)
    }
}

impl CidStore for SqliteStore {
    fn store(&self, cid: &Cid, data: &[u8]) -> Result<(), StoreError> {
        SqliteStore::store(self, cid, data)
    }

    fn store_many(&self, items: &[(Cid, Vec<u8>)]) -> Result<(), StoreError> {
        SqliteStore::store_many(self, items)
    }

    fn get(&self, cid: &Cid) -> Result<Option<Vec<u8>>, StoreError> {
        SqliteStore::get(self, cid)
    }

    fn get_many(&self, cids: &[Cid]) -> Result<HashMap<Cid, Vec<u8>>, StoreError> {
        SqliteStore::get_many(self, cids)
    }

    fn exists(&self, cid: &Cid) -> Result<bool, StoreError> {
        SqliteStore::exists(self, cid)
    }

    fn missing(&self, cids: &[Cid]) -> Result<Vec<Cid>, StoreError> {
        SqliteStore::missing(self, cids)
    }

    fn stats(&self) -> Result<StoreStats, StoreError> {
        SqliteStore::stats(self)
    }

    fn list_entries(&self) -> Result<Vec<StoreEntry>, StoreError> {
        SqliteStore::list_entries(self)
    }
}

fn now() -> f64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs_f64()).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cideldill_codec::cid as compute_cid;

    #[test]
    fn store_and_get_round_trips() {
        let store = SqliteStore::open_in_memory().unwrap();
        let data = b"hello".to_vec();
        let cid = compute_cid(&data);
        store.store(&cid, &data).unwrap();
        assert_eq!(store.get(&cid).unwrap(), Some(data));
    }

    #[test]
    fn store_is_idempotent() {
        let store = SqliteStore::open_in_memory().unwrap();
        let data = b"repeat me".to_vec();
        let cid = compute_cid(&data);
        store.store(&cid, &data).unwrap();
        store.store(&cid, &data).unwrap();
        assert_eq!(store.stats().unwrap().count, 1);
    }

    #[test]
    fn store_rejects_mismatched_cid() {
        let store = SqliteStore::open_in_memory().unwrap();
        let wrong_cid = compute_cid(b"something else");
        assert!(store.store(&wrong_cid, b"hello").is_err());
    }

    #[test]
    fn missing_reports_absent_cids() {
        let store = SqliteStore::open_in_memory().unwrap();
        let present = compute_cid(b"present");
        store.store(&present, b"present").unwrap();
        let absent = compute_cid(b"absent");
        let missing = store.missing(&[present.clone(), absent.clone()]).unwrap();
        assert_eq!(missing, vec![absent]);
    }

    #[test]
    fn file_backed_store_persists_within_a_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cid.sqlite3");
        let data = b"on disk".to_vec();
        let cid = compute_cid(&data);
        {
            let store = SqliteStore::open(&path).unwrap();
            store.store(&cid, &data).unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.get(&cid).unwrap(), Some(data));
    }

    #[test]
    fn store_many_is_atomic() {
        let store = SqliteStore::open_in_memory().unwrap();
        let items: Vec<(Cid, Vec<u8>)> = (0..5)
            .map(|i| {
                let data = format!("item-{i}").into_bytes();
                (compute_cid(&data), data)
            })
            .collect();
        store.store_many(&items).unwrap();
        assert_eq!(store.stats().unwrap().count, 5);
    }
}
