/// Durable key-value media for the state engine.
///
/// Every medium stores one text value per key. Encoding typed values into
/// that text is the caller's job; the medium only moves strings.
pub mod memory;
pub mod redb_store;

pub use memory::MemoryStore;
pub use redb_store::RedbStore;

/// A key-value store with text values that outlives the process.
///
/// Implementations must be safe to share between cells via `Arc`.
pub trait KeyValueStore: Send + Sync {
    /// Reads the text stored under `key`.
    ///
    /// Returns `Ok(None)` when the key is absent and `Err` when the medium
    /// itself could not be read.
    fn get(&self, key: &str) -> anyhow::Result<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
}
