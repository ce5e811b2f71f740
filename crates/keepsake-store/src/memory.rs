/// In-memory durable medium for tests and ephemeral sessions.
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{bail, Result};

use crate::KeyValueStore;

#[derive(Debug, Default)]
struct Inner {
    entries: BTreeMap<String, String>,
    writes: HashMap<String, usize>,
    failing_keys: HashSet<String>,
}

/// A `KeyValueStore` that keeps everything in a map.
///
/// Reads and writes can be switched to fail, which simulates an unavailable
/// medium or one that rejects writes (e.g. quota exceeded).
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Creates a store pre-populated with raw entries.
    pub fn with_entries<I, K, V>(entries: I) -> Arc<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let store = Self::default();
        {
            let mut inner = store.lock();
            for (k, v) in entries {
                inner.entries.insert(k.into(), v.into());
            }
        }
        Arc::new(store)
    }

    /// Makes subsequent reads fail (or succeed again).
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes subsequent writes fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes subsequent writes to `key` alone fail (or succeed again).
    pub fn set_fail_writes_for(&self, key: &str, fail: bool) {
        let mut inner = self.lock();
        if fail {
            inner.failing_keys.insert(key.to_string());
        } else {
            inner.failing_keys.remove(key);
        }
    }

    /// Number of successful writes recorded for `key`.
    pub fn write_count(&self, key: &str) -> usize {
        self.lock().writes.get(key).copied().unwrap_or(0)
    }

    /// Raw text currently stored under `key`, bypassing failure switches.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.lock().entries.get(key).cloned()
    }

    /// All stored keys in key order.
    pub fn keys(&self) -> Vec<String> {
        self.lock().entries.keys().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock leaves the map intact
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            bail!("memory store is unavailable");
        }
        Ok(self.lock().entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("memory store rejected write to '{key}': quota exceeded");
        }
        let mut inner = self.lock();
        if inner.failing_keys.contains(key) {
            bail!("memory store rejected write to '{key}': read-only key");
        }
        inner.entries.insert(key.to_string(), value.to_string());
        *inner.writes.entry(key.to_string()).or_insert(0) += 1;
        Ok(())
    }
}
