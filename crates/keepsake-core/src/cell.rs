/// A single value kept in sync with a durable key-value medium.
///
/// The stored text is read lazily, once, on first access. Every write
/// re-encodes and re-stores the whole value under the cell's key.
use std::sync::Arc;

use keepsake_store::KeyValueStore;

use crate::codec::{Codec, JsonCodec};
use crate::error::{Result, StateError};

/// The value a cell starts from when nothing usable is stored.
pub enum Initial<T> {
    /// A ready value.
    Value(T),
    /// A producer evaluated at most once, and only if the stored value is
    /// absent, unreadable, or undecodable.
    With(Box<dyn FnOnce() -> T + Send>),
}

impl<T> Initial<T> {
    /// Wraps a producer function.
    pub fn with<F>(producer: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        Self::With(Box::new(producer))
    }

    fn resolve(self) -> T {
        match self {
            Self::Value(value) => value,
            Self::With(producer) => producer(),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Initial<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::With(_) => f.write_str("With(..)"),
        }
    }
}

/// Binds one key of a durable medium to an in-memory value.
///
/// Single-threaded by contract: two cells bound to the same key are not
/// coordinated and the last write wins at the medium.
pub struct DurableCell<T, C = JsonCodec> {
    key: String,
    store: Arc<dyn KeyValueStore>,
    codec: C,
    /// Consumed by the first load; dropped unused if a write comes first.
    initial: Option<Initial<T>>,
    /// `None` until the first read or write.
    value: Option<T>,
}

impl<T, C> std::fmt::Debug for DurableCell<T, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableCell")
            .field("key", &self.key)
            .field("loaded", &self.value.is_some())
            .finish()
    }
}

impl<T> DurableCell<T, JsonCodec>
where
    JsonCodec: Codec<T>,
{
    /// Creates a cell using the default JSON codec. Nothing is read yet.
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        key: impl Into<String>,
        initial: Initial<T>,
    ) -> Self {
        Self::with_codec(store, key, initial, JsonCodec)
    }
}

impl<T, C: Codec<T>> DurableCell<T, C> {
    /// Creates a cell with a caller-supplied codec. Nothing is read yet.
    pub fn with_codec(
        store: Arc<dyn KeyValueStore>,
        key: impl Into<String>,
        initial: Initial<T>,
        codec: C,
    ) -> Self {
        Self {
            key: key.into(),
            store,
            codec,
            initial: Some(initial),
            value: None,
        }
    }

    /// Returns the key this cell is bound to.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether the value has been loaded or written.
    pub fn is_loaded(&self) -> bool {
        self.value.is_some()
    }

    /// Returns the current value, loading it from the medium on first access.
    pub fn read(&mut self) -> &T {
        let value = match self.value.take() {
            Some(value) => value,
            None => self.load(),
        };
        self.value.insert(value)
    }

    /// Replaces the value and persists it in full.
    ///
    /// The in-memory value changes even when encoding or the medium fails;
    /// the failure is returned so the caller knows the value is not durable.
    ///
    /// # Errors
    ///
    /// Returns `StateError::Encode` or `StateError::Persist`.
    pub fn write(&mut self, value: T) -> Result<()> {
        self.initial = None;
        let value = self.value.insert(value);
        persist(&*self.store, &self.codec, &self.key, value)
    }

    /// Replaces the value with `f(current)` and persists it.
    ///
    /// # Errors
    ///
    /// Same as [`DurableCell::write`].
    pub fn update<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&T) -> T,
    {
        let next = f(self.read());
        self.write(next)
    }

    /// Mutates the value in place and persists it.
    ///
    /// # Errors
    ///
    /// Same as [`DurableCell::write`].
    pub fn modify<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&mut T),
    {
        let value = match self.value.take() {
            Some(value) => value,
            None => self.load(),
        };
        let value = self.value.insert(value);
        f(value);
        persist(&*self.store, &self.codec, &self.key, value)
    }

    /// Replaces the in-memory value without touching the medium.
    pub(crate) fn replace_cached(&mut self, value: T) {
        self.initial = None;
        self.value = Some(value);
    }

    fn load(&mut self) -> T {
        match self.store.get(&self.key) {
            Ok(Some(text)) => match self.codec.decode(&text) {
                Ok(value) => {
                    tracing::debug!("Loaded '{}' from durable storage", self.key);
                    self.initial = None;
                    return value;
                }
                Err(e) => {
                    tracing::warn!("Ignoring undecodable value for '{}': {e:#}", self.key);
                }
            },
            Ok(None) => {
                tracing::debug!("No stored value for '{}', using default", self.key);
            }
            Err(e) => {
                tracing::warn!("Failed to read '{}', using default: {e:#}", self.key);
            }
        }

        // `initial` is only cleared once `value` holds something, and `load`
        // only runs while `value` is empty.
        self.initial
            .take()
            .map(Initial::resolve)
            .expect("initial value is held until the first load")
    }
}

fn persist<T, C: Codec<T>>(
    store: &dyn KeyValueStore,
    codec: &C,
    key: &str,
    value: &T,
) -> Result<()> {
    let text = codec.encode(value).map_err(|source| {
        tracing::warn!("Failed to encode '{key}': {source:#}");
        StateError::Encode {
            key: key.to_string(),
            source,
        }
    })?;
    store.set(key, &text).map_err(|source| {
        tracing::warn!("Failed to persist '{key}': {source:#}");
        StateError::Persist {
            key: key.to_string(),
            source,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::FnCodec;
    use keepsake_store::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_initial(counter: &Arc<AtomicUsize>, value: &str) -> Initial<String> {
        let counter = Arc::clone(counter);
        let value = value.to_string();
        Initial::with(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            value
        })
    }

    #[test]
    fn test_read_absent_uses_literal_default() {
        let store = MemoryStore::new();
        let mut cell = DurableCell::new(store, "count", Initial::Value(3u32));
        assert!(!cell.is_loaded());
        assert_eq!(*cell.read(), 3);
        assert!(cell.is_loaded());
    }

    #[test]
    fn test_read_does_not_persist_default() {
        let store = MemoryStore::new();
        let mut cell = DurableCell::new(store.clone(), "count", Initial::Value(3u32));
        cell.read();
        assert!(store.raw("count").is_none());
    }

    #[test]
    fn test_initializer_runs_once_across_reads() {
        let store = MemoryStore::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let mut cell = DurableCell::new(store, "name", counting_initial(&calls, "anon"));

        for _ in 0..5 {
            assert_eq!(cell.read(), "anon");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_initializer_not_run_when_value_stored() {
        let store = MemoryStore::with_entries([("name", "\"Ada\"")]);
        let calls = Arc::new(AtomicUsize::new(0));
        let mut cell = DurableCell::new(store, "name", counting_initial(&calls, "anon"));

        assert_eq!(cell.read(), "Ada");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_initializer_not_run_when_written_first() {
        let store = MemoryStore::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let mut cell = DurableCell::new(store, "name", counting_initial(&calls, "anon"));

        cell.write("Grace".to_string()).expect("write");
        assert_eq!(cell.read(), "Grace");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_modify_before_read_loads_once() {
        let store = MemoryStore::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let mut cell = DurableCell::new(store.clone(), "name", counting_initial(&calls, "anon"));

        cell.modify(|name| name.push('!')).expect("modify");
        cell.modify(|name| name.push('?')).expect("modify again");
        assert_eq!(cell.read(), "anon!?");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.raw("name").as_deref(), Some("\"anon!?\""));
    }

    #[test]
    fn test_medium_is_read_once() {
        let store = MemoryStore::with_entries([("n", "1")]);
        let mut cell = DurableCell::new(store.clone(), "n", Initial::Value(0u32));
        assert_eq!(*cell.read(), 1);

        // Later changes to the medium are not picked up by a loaded cell
        store.set("n", "2").expect("set");
        assert_eq!(*cell.read(), 1);
    }

    #[test]
    fn test_write_persists_full_value() {
        let store = MemoryStore::new();
        let mut cell = DurableCell::new(store.clone(), "list", Initial::Value(Vec::<u8>::new()));
        cell.write(vec![1, 2, 3]).expect("write");
        assert_eq!(*cell.read(), vec![1, 2, 3]);
        assert_eq!(store.raw("list").as_deref(), Some("[1,2,3]"));
    }

    #[test]
    fn test_equal_write_still_persists() {
        let store = MemoryStore::new();
        let mut cell = DurableCell::new(store.clone(), "n", Initial::Value(5u32));
        cell.write(5).expect("write");
        cell.write(5).expect("write again");
        assert_eq!(store.write_count("n"), 2);
    }

    #[test]
    fn test_update_applies_to_current_value() {
        let store = MemoryStore::with_entries([("n", "10")]);
        let mut cell = DurableCell::new(store.clone(), "n", Initial::Value(0u32));
        cell.update(|n| n + 1).expect("update");
        assert_eq!(*cell.read(), 11);
        assert_eq!(store.raw("n").as_deref(), Some("11"));
    }

    #[test]
    fn test_modify_in_place() {
        let store = MemoryStore::new();
        let mut cell = DurableCell::new(store.clone(), "list", Initial::Value(vec![1u8]));
        cell.modify(|v| v.push(2)).expect("modify");
        assert_eq!(*cell.read(), vec![1, 2]);
        assert_eq!(store.raw("list").as_deref(), Some("[1,2]"));
    }

    #[test]
    fn test_corrupt_value_falls_back_to_default() {
        let store = MemoryStore::with_entries([("n", "{{not json")]);
        let mut cell = DurableCell::new(store, "n", Initial::Value(42u32));
        assert_eq!(*cell.read(), 42);
    }

    #[test]
    fn test_foreign_format_falls_back_to_initializer() {
        let store = MemoryStore::with_entries([("name", "42")]);
        let calls = Arc::new(AtomicUsize::new(0));
        let mut cell = DurableCell::new(store, "name", counting_initial(&calls, "anon"));
        assert_eq!(cell.read(), "anon");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unavailable_medium_falls_back_to_default() {
        let store = MemoryStore::with_entries([("n", "7")]);
        store.set_fail_reads(true);
        let mut cell = DurableCell::new(store, "n", Initial::Value(1u32));
        assert_eq!(*cell.read(), 1);
    }

    #[test]
    fn test_empty_stored_values_are_honored() {
        let store = MemoryStore::with_entries([("name", "\"\""), ("n", "0"), ("list", "[]")]);

        let anon = Initial::Value("anon".to_string());
        let mut name = DurableCell::new(store.clone(), "name", anon);
        let mut n = DurableCell::new(store.clone(), "n", Initial::Value(9u32));
        let mut list = DurableCell::new(store, "list", Initial::Value(vec![1u8]));

        assert_eq!(name.read(), "");
        assert_eq!(*n.read(), 0);
        assert!(list.read().is_empty());
    }

    #[test]
    fn test_failed_write_still_updates_memory() {
        let store = MemoryStore::new();
        let mut cell = DurableCell::new(store.clone(), "n", Initial::Value(0u32));
        store.set_fail_writes(true);

        let err = cell.write(8).expect_err("write should fail");
        assert!(matches!(err, StateError::Persist { ref key, .. } if key == "n"));
        assert_eq!(*cell.read(), 8);
        assert!(store.raw("n").is_none());

        // Caller-driven retry once the medium recovers
        store.set_fail_writes(false);
        cell.update(|n| *n).expect("retry");
        assert_eq!(store.raw("n").as_deref(), Some("8"));
    }

    #[test]
    fn test_encode_failure_still_updates_memory() {
        use std::collections::HashMap;

        // JSON object keys must be strings
        let store = MemoryStore::new();
        let mut cell = DurableCell::new(
            store.clone(),
            "map",
            Initial::Value(HashMap::<Vec<u8>, u8>::new()),
        );
        let mut map = HashMap::new();
        map.insert(vec![1u8], 1u8);

        let err = cell.write(map).expect_err("encode should fail");
        assert!(matches!(err, StateError::Encode { .. }));
        assert_eq!(cell.read().len(), 1);
        assert!(store.raw("map").is_none());
    }

    #[test]
    fn test_custom_codec() {
        let store = MemoryStore::with_entries([("flag", "yes")]);
        let codec = FnCodec::new(
            |v: &bool| if *v { "yes".to_string() } else { "no".to_string() },
            |s: &str| match s {
                "yes" => Ok(true),
                "no" => Ok(false),
                other => anyhow::bail!("unexpected flag '{other}'"),
            },
        );
        let mut cell = DurableCell::with_codec(store.clone(), "flag", Initial::Value(false), codec);
        assert!(*cell.read());
        cell.write(false).expect("write");
        assert_eq!(store.raw("flag").as_deref(), Some("no"));
    }

    #[test]
    fn test_debug_does_not_require_debug_value() {
        struct Opaque;
        let store = MemoryStore::new();
        let codec = FnCodec::new(
            |_: &Opaque| String::new(),
            |_: &str| -> anyhow::Result<Opaque> { Ok(Opaque) },
        );
        let cell = DurableCell::with_codec(store, "opaque", Initial::Value(Opaque), codec);
        assert_eq!(
            format!("{cell:?}"),
            "DurableCell { key: \"opaque\", loaded: false }"
        );
    }
}
