use std::collections::BTreeMap;
use std::path::Path;

use chrono::Local;
use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;

/// Browsers cap local storage at roughly 5 MiB per origin.
pub const DEFAULT_QUOTA_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage quota exceeded writing '{key}' ({needed} bytes needed, quota {quota})")]
    QuotaExceeded {
        key: String,
        needed: usize,
        quota: usize,
    },
    #[error("storage backend error: {0}")]
    Backend(#[from] rusqlite::Error),
}

/// Durable string key-value storage with the local-storage contract.
pub trait KeyValueStorage: Send {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove_item(&mut self, key: &str) -> Result<bool, StorageError>;
}

fn entry_size(key: &str, value: &str) -> usize {
    key.len() + value.len()
}

// --- SQLite backend ---

pub struct SqliteStorage {
    conn: Connection,
    quota: usize,
}

impl SqliteStorage {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open storage: {}", path.display()))?;
        let storage = SqliteStorage {
            conn,
            quota: DEFAULT_QUOTA_BYTES,
        };
        storage.migrate()?;
        Ok(storage)
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        let storage = SqliteStorage {
            conn,
            quota: DEFAULT_QUOTA_BYTES,
        };
        storage.migrate()?;
        Ok(storage)
    }

    #[must_use]
    pub fn with_quota(mut self, quota: usize) -> Self {
        self.quota = quota;
        self
    }

    fn migrate(&self) -> anyhow::Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS local_storage (
                    key TEXT PRIMARY KEY NOT NULL,
                    value TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    pub fn keys(&self) -> Result<Vec<String>, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT key FROM local_storage ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(keys)
    }

    /// Bytes currently held, counted as key plus value length per row.
    pub fn usage_bytes(&self) -> Result<usize, StorageError> {
        let used: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(LENGTH(CAST(key AS BLOB)) + LENGTH(CAST(value AS BLOB))), 0)
             FROM local_storage",
            [],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(used).unwrap_or(0))
    }

    fn size_of(&self, key: &str) -> Result<usize, StorageError> {
        let value: Option<String> = self.get_item(key)?;
        Ok(value.map_or(0, |v| entry_size(key, &v)))
    }
}

impl KeyValueStorage for SqliteStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM local_storage WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        let needed = self.usage_bytes()? - self.size_of(key)? + entry_size(key, value);
        if needed > self.quota {
            return Err(StorageError::QuotaExceeded {
                key: key.to_string(),
                needed,
                quota: self.quota,
            });
        }

        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO local_storage (key, value, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, now],
        )?;
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<bool, StorageError> {
        let rows = self
            .conn
            .execute("DELETE FROM local_storage WHERE key = ?1", params![key])?;
        Ok(rows > 0)
    }
}

// --- In-memory backend ---

#[derive(Debug, Clone)]
pub struct MemoryStorage {
    items: BTreeMap<String, String>,
    quota: usize,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self {
            items: BTreeMap::new(),
            quota: DEFAULT_QUOTA_BYTES,
        }
    }
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_quota(quota: usize) -> Self {
        Self {
            items: BTreeMap::new(),
            quota,
        }
    }

    #[must_use]
    pub fn usage_bytes(&self) -> usize {
        self.items.iter().map(|(k, v)| entry_size(k, v)).sum()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.items.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        let current = self.items.get(key).map_or(0, |v| entry_size(key, v));
        let needed = self.usage_bytes() - current + entry_size(key, value);
        if needed > self.quota {
            return Err(StorageError::QuotaExceeded {
                key: key.to_string(),
                needed,
                quota: self.quota,
            });
        }
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<bool, StorageError> {
        Ok(self.items.remove(key).is_some())
    }
}

impl<S: KeyValueStorage + ?Sized> KeyValueStorage for Box<S> {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get_item(key)
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set_item(key, value)
    }

    fn remove_item(&mut self, key: &str) -> Result<bool, StorageError> {
        (**self).remove_item(key)
    }
}
