//! SQLite-backed key-value store.
//!
//! Holds the persisted session keys. Values are integers stored as text so
//! the table stays readable with the sqlite3 shell.

use std::path::Path;

use rusqlite::{params, Connection};

use crate::error::StorageError;
use crate::platform::KeyValueStore;

pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the database at `path`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let conn = Connection::open(path).map_err(|source| StorageError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, rusqlite::Error> {
        let mut stmt = self.conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn kv_delete(&self, key: &str) -> Result<(), rusqlite::Error> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

impl KeyValueStore for Database {
    fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.kv_get(key)?.is_some())
    }

    fn read_int(&self, key: &str) -> Result<Option<i64>, StorageError> {
        match self.kv_get(key)? {
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .map(Some)
                .map_err(|_| StorageError::Corrupt {
                    key: key.to_string(),
                    value: raw,
                }),
            None => Ok(None),
        }
    }

    fn write_int(&mut self, key: &str, value: i64) -> Result<(), StorageError> {
        Ok(self.kv_set(key, &value.to_string())?)
    }

    fn delete(&mut self, key: &str) -> Result<(), StorageError> {
        Ok(self.kv_delete(key)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kv_store() {
        let db = Database::open_memory().unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
        db.kv_set("test", "hello").unwrap();
        assert_eq!(db.kv_get("test").unwrap().unwrap(), "hello");
        db.kv_delete("test").unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
    }

    #[test]
    fn int_roundtrip_and_delete_missing() {
        let mut db = Database::open_memory().unwrap();
        db.write_int("session.tea_index", 7).unwrap();
        assert_eq!(db.read_int("session.tea_index").unwrap(), Some(7));
        assert!(db.exists("session.tea_index").unwrap());
        db.delete("session.tea_index").unwrap();
        db.delete("session.tea_index").unwrap();
        assert_eq!(db.read_int("session.tea_index").unwrap(), None);
    }

    #[test]
    fn non_integer_value_is_corrupt() {
        let db = Database::open_memory().unwrap();
        db.kv_set("session.phase", "steeping").unwrap();
        assert!(matches!(
            db.read_int("session.phase"),
            Err(StorageError::Corrupt { .. })
        ));
    }

    #[test]
    fn reopen_keeps_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("teaready.db");
        {
            let mut db = Database::open(&path).unwrap();
            db.write_int("session.duration_secs", 240).unwrap();
        }
        let db = Database::open(&path).unwrap();
        assert_eq!(db.read_int("session.duration_secs").unwrap(), Some(240));
    }
}
