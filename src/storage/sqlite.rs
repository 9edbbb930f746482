use std::{
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use log::{error, info};
use rusqlite::{params, Connection, OptionalExtension};

use super::{migrations::run_migrations, KeyValueBackend};

/// Durable backend: one `kv_entries` row per key.
pub struct SqliteBackend {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl SqliteBackend {
    pub fn open(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create storage directory {}", parent.display())
            })?;
        }

        let mut conn = Connection::open(&db_path)
            .with_context(|| format!("failed to open SQLite storage {}", db_path.display()))?;

        if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
            error!("Failed to enable WAL mode: {err}");
        }

        run_migrations(&mut conn).context("failed to run storage migrations")?;

        info!("Storage initialized at {}", db_path.display());

        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
        })
    }

    pub fn path(&self) -> &Path {
        self.db_path.as_path()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("storage connection lock poisoned"))
    }
}

impl KeyValueBackend for SqliteBackend {
    fn get_raw(&self, key: &str) -> Result<Option<String>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT value FROM kv_entries WHERE key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        )
        .optional()
        .with_context(|| format!("failed to read key '{key}'"))
    }

    fn set_raw(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO kv_entries (key, value, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at",
            params![key, value, Utc::now().to_rfc3339()],
        )
        .with_context(|| format!("failed to write key '{key}'"))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM kv_entries WHERE key = ?1", params![key])
            .with_context(|| format!("failed to delete key '{key}'"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::storage::{keys, SafeStorage};

    #[test]
    fn values_survive_reopen() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("funnel.sqlite3");

        {
            let storage = SafeStorage::new(Arc::new(SqliteBackend::open(path.clone()).unwrap()));
            storage.set(keys::USER_GENDER, "male");
        }

        let storage = SafeStorage::new(Arc::new(SqliteBackend::open(path).unwrap()));
        assert_eq!(storage.get::<String>(keys::USER_GENDER).as_deref(), Some("male"));
    }

    #[test]
    fn overwrite_replaces_previous_value() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = SqliteBackend::open(temp_dir.path().join("kv.sqlite3")).unwrap();

        backend.set_raw("k", "1").unwrap();
        backend.set_raw("k", "2").unwrap();

        assert_eq!(backend.get_raw("k").unwrap().as_deref(), Some("2"));
        backend.remove("k").unwrap();
        assert!(backend.get_raw("k").unwrap().is_none());
    }

    #[test]
    fn creates_missing_parent_directories() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("dir").join("kv.sqlite3");

        let backend = SqliteBackend::open(path.clone()).unwrap();

        assert_eq!(backend.path(), path.as_path());
        assert!(path.exists());
    }

    #[test]
    fn rejects_newer_schema() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("kv.sqlite3");
        {
            let conn = Connection::open(&path).unwrap();
            conn.pragma_update(None, "user_version", 99).unwrap();
        }

        assert!(SqliteBackend::open(path).is_err());
    }
}
