/// Disk-backed store using redb.
///
/// Uses a single redb database file with one table, `entries`, mapping each
/// key to its full encoded text. Writes are upserts in their own transaction.
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use crate::KeyValueStore;

/// Entry table: key → encoded text.
const ENTRIES_TABLE: TableDefinition<&str, &str> = TableDefinition::new("entries");

/// Default database file name used by [`RedbStore::open_in`].
pub const DEFAULT_DB_FILE: &str = "keepsake.redb";

/// Durable medium backed by an embedded redb database.
///
/// Thread-safe: redb supports concurrent readers and serialized writers.
pub struct RedbStore {
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish()
    }
}

impl RedbStore {
    /// Opens or creates the database at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the entry table
    /// cannot be created.
    pub fn open(path: &Path) -> Result<Arc<Self>> {
        let db = Database::create(path)
            .with_context(|| format!("Failed to open state database: {}", path.display()))?;

        // Ensure the table exists so first reads don't fail
        let write_txn = db
            .begin_write()
            .context("Failed to begin initial write transaction")?;
        {
            let _ = write_txn
                .open_table(ENTRIES_TABLE)
                .context("Failed to create entries table")?;
        }
        write_txn
            .commit()
            .context("Failed to commit initial transaction")?;

        tracing::debug!("Opened state database at {}", path.display());
        Ok(Arc::new(Self { db }))
    }

    /// Opens or creates `keepsake.redb` inside `data_dir`, creating the
    /// directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the database
    /// cannot be opened.
    pub fn open_in(data_dir: &Path) -> Result<Arc<Self>> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;
        Self::open(&data_dir.join(DEFAULT_DB_FILE))
    }

    /// Lists all stored keys in key order.
    ///
    /// # Errors
    ///
    /// Returns an error if the read transaction fails.
    pub fn keys(&self) -> Result<Vec<String>> {
        let read_txn = self
            .db
            .begin_read()
            .context("Failed to begin read transaction")?;
        let table = read_txn
            .open_table(ENTRIES_TABLE)
            .context("Failed to open entries table")?;

        let mut keys = Vec::new();
        for entry in table.iter().context("Failed to iterate entries table")? {
            let (key_guard, _) = entry.context("Failed to read entry")?;
            keys.push(key_guard.value().to_string());
        }
        Ok(keys)
    }

    /// Removes the entry for `key`. Returns whether an entry existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the write transaction fails.
    pub fn remove(&self, key: &str) -> Result<bool> {
        let write_txn = self
            .db
            .begin_write()
            .context("Failed to begin write transaction")?;
        let existed = {
            let mut table = write_txn
                .open_table(ENTRIES_TABLE)
                .context("Failed to open entries table")?;
            let removed = table.remove(key).context("Failed to remove entry")?;
            removed.is_some()
        };
        write_txn.commit().context("Failed to commit removal")?;
        Ok(existed)
    }
}

impl KeyValueStore for RedbStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let read_txn = self
            .db
            .begin_read()
            .context("Failed to begin read transaction")?;
        let table = read_txn
            .open_table(ENTRIES_TABLE)
            .context("Failed to open entries table")?;

        match table
            .get(key)
            .with_context(|| format!("Failed to read entry '{key}'"))?
        {
            Some(guard) => Ok(Some(guard.value().to_string())),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let write_txn = self
            .db
            .begin_write()
            .context("Failed to begin write transaction")?;
        {
            let mut table = write_txn
                .open_table(ENTRIES_TABLE)
                .context("Failed to open entries table")?;
            table
                .insert(key, value)
                .with_context(|| format!("Failed to insert entry '{key}'"))?;
        }
        write_txn
            .commit()
            .with_context(|| format!("Failed to commit entry '{key}'"))?;
        Ok(())
    }
}
