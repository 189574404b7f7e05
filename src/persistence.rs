//! Key-value storage for the ledger

use crate::error::ChainError;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

/// One mutation inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

/// Ordered set of mutations applied all together or not at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.ops.push(BatchOp::Put {
            key: key.into(),
            value: value.into(),
        });
    }

    pub fn delete(&mut self, key: impl Into<Vec<u8>>) {
        self.ops.push(BatchOp::Delete { key: key.into() });
    }

    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Abstraction for storage backends. `write_batch` must be atomic: after a
/// failure no key of the batch is visible.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, ChainError>;
    fn write_batch(&self, batch: WriteBatch) -> Result<(), ChainError>;
}

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ChainError> {
        let conn = Connection::open(path.as_ref())
            .map_err(|e| ChainError::DatabaseError(format!("Failed to open database: {}", e)))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, ChainError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| ChainError::DatabaseError(format!("Failed to open database: {}", e)))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, ChainError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key BLOB PRIMARY KEY,
                value BLOB NOT NULL
            )",
            [],
        )
        .map_err(|e| ChainError::DatabaseError(format!("Failed to create kv table: {}", e)))?;

        Ok(Database { conn: Mutex::new(conn) })
    }

    fn apply(conn: &Connection, batch: &WriteBatch) -> Result<(), rusqlite::Error> {
        let tx = conn.unchecked_transaction()?;
        {
            let mut put = tx.prepare_cached("INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)")?;
            let mut delete = tx.prepare_cached("DELETE FROM kv WHERE key = ?1")?;
            for op in batch.ops() {
                match op {
                    BatchOp::Put { key, value } => {
                        put.execute(params![key, value])?;
                    }
                    BatchOp::Delete { key } => {
                        delete.execute(params![key])?;
                    }
                }
            }
        }
        // Dropping `tx` without commit rolls everything back.
        tx.commit()
    }
}

impl KvStore for Database {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, ChainError> {
        let conn = self.conn.lock().map_err(|_| ChainError::DatabaseError("Mutex poisoned".to_string()))?;
        conn.query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| row.get(0))
            .optional()
            .map_err(|e| ChainError::DatabaseError(format!("Failed to read key: {}", e)))
    }

    fn write_batch(&self, batch: WriteBatch) -> Result<(), ChainError> {
        let conn = self.conn.lock().map_err(|_| ChainError::StoreWriteFailure("Mutex poisoned".to_string()))?;
        Self::apply(&conn, &batch).map_err(|e| {
            ChainError::StoreWriteFailure(format!("Failed to commit batch of {} ops: {}", batch.len(), e))
        })
    }
}

/// Simple in-memory store useful for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: Mutex<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KvStore for InMemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, ChainError> {
        let entries = self.entries.lock().map_err(|_| ChainError::DatabaseError("Mutex poisoned".to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn write_batch(&self, batch: WriteBatch) -> Result<(), ChainError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| ChainError::StoreWriteFailure("Mutex poisoned".to_string()))?;
        for op in batch.ops {
            match op {
                BatchOp::Put { key, value } => {
                    entries.insert(key, value);
                }
                BatchOp::Delete { key } => {
                    entries.remove(&key);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise_store(store: &dyn KvStore) {
        assert_eq!(store.get(b"missing").unwrap(), None);

        let mut batch = WriteBatch::new();
        batch.put(b"a".to_vec(), b"1".to_vec());
        batch.put(b"b".to_vec(), b"2".to_vec());
        store.write_batch(batch).unwrap();
        assert_eq!(store.get(b"a").unwrap(), Some(b"1".to_vec()));

        let mut batch = WriteBatch::new();
        batch.put(b"a".to_vec(), b"3".to_vec());
        batch.delete(b"b".to_vec());
        store.write_batch(batch).unwrap();
        assert_eq!(store.get(b"a").unwrap(), Some(b"3".to_vec()));
        assert_eq!(store.get(b"b").unwrap(), None);
    }

    #[test]
    fn test_database_open() {
        let db = Database::open(":memory:").unwrap();
        assert!(db.conn.lock().unwrap().is_autocommit());
    }

    #[test]
    fn test_sqlite_store() {
        let db = Database::open_in_memory().unwrap();
        exercise_store(&db);
    }

    #[test]
    fn test_in_memory_store() {
        let store = InMemoryStore::new();
        exercise_store(&store);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_later_op_in_batch_wins() {
        let db = Database::open_in_memory().unwrap();
        let mut batch = WriteBatch::new();
        batch.put(b"k".to_vec(), b"first".to_vec());
        batch.put(b"k".to_vec(), b"second".to_vec());
        db.write_batch(batch).unwrap();
        assert_eq!(db.get(b"k").unwrap(), Some(b"second".to_vec()));
    }

    #[test]
    fn test_failed_batch_leaves_nothing_behind() {
        let db = Database::open_in_memory().unwrap();
        {
            let conn = db.conn.lock().unwrap();
            conn.execute_batch(
                "CREATE TRIGGER reject_poison BEFORE INSERT ON kv
                 WHEN NEW.key = X'706F69736F6E'
                 BEGIN SELECT RAISE(ABORT, 'poisoned key'); END;",
            )
            .unwrap();
        }

        let mut batch = WriteBatch::new();
        batch.put(b"good".to_vec(), b"1".to_vec());
        batch.put(b"poison".to_vec(), b"2".to_vec());
        let err = db.write_batch(batch).unwrap_err();

        assert!(matches!(err, ChainError::StoreWriteFailure(_)));
        assert_eq!(db.get(b"good").unwrap(), None);
        assert!(db.conn.lock().unwrap().is_autocommit());
    }

    #[test]
    fn test_reopen_sees_committed_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        {
            let db = Database::open(&path).unwrap();
            let mut batch = WriteBatch::new();
            batch.put(b"tip".to_vec(), b"7".to_vec());
            db.write_batch(batch).unwrap();
        }
        let db = Database::open(&path).unwrap();
        assert_eq!(db.get(b"tip").unwrap(), Some(b"7".to_vec()));
    }
}
