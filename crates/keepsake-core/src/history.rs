/// Linear snapshot history with a movable cursor.
///
/// The snapshot sequence and the cursor each live in their own
/// `DurableCell`, so both survive restarts. Committing from a past
/// position discards every snapshot after the cursor before appending.
use std::sync::Arc;

use keepsake_store::KeyValueStore;

use crate::cell::{DurableCell, Initial};
use crate::codec::{Codec, JsonCodec};
use crate::error::{Result, StateError};

/// Storage keys for a history's two cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryKeys {
    /// Key of the encoded snapshot sequence.
    pub snapshots: String,
    /// Key of the encoded cursor index.
    pub cursor: String,
}

impl HistoryKeys {
    pub fn new(snapshots: impl Into<String>, cursor: impl Into<String>) -> Self {
        Self {
            snapshots: snapshots.into(),
            cursor: cursor.into(),
        }
    }

    /// Keys `"{name}"` and `"{name}.cursor"`.
    pub fn named(name: &str) -> Self {
        Self::new(name, format!("{name}.cursor"))
    }
}

/// One entry of the history as seen by a navigation UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepPosition {
    pub index: usize,
    pub is_current: bool,
}

/// A value with an undo/redo-style history.
///
/// Invariants: there is always at least one snapshot, and the cursor
/// always addresses an existing one.
pub struct HistoryCursor<T, C = JsonCodec> {
    snapshots: DurableCell<Vec<T>, C>,
    cursor: DurableCell<usize>,
    /// Snapshot used to repair an empty stored sequence.
    seed: T,
    /// Whether the loaded state has been checked against the invariants.
    validated: bool,
}

impl<T, C> std::fmt::Debug for HistoryCursor<T, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryCursor")
            .field("snapshots", &self.snapshots)
            .field("cursor", &self.cursor)
            .field("validated", &self.validated)
            .finish()
    }
}

impl<T: Clone> HistoryCursor<T, JsonCodec>
where
    JsonCodec: Codec<Vec<T>>,
{
    /// Opens a history stored as JSON. `initial` seeds a fresh history.
    pub fn open(store: Arc<dyn KeyValueStore>, keys: HistoryKeys, initial: T) -> Self {
        Self::open_with_codec(store, keys, initial, JsonCodec)
    }
}

impl<T: Clone, C: Codec<Vec<T>>> HistoryCursor<T, C> {
    /// Opens a history whose snapshot sequence uses `codec`.
    ///
    /// The cursor is always stored as JSON. Nothing is read until the
    /// first operation.
    pub fn open_with_codec(
        store: Arc<dyn KeyValueStore>,
        keys: HistoryKeys,
        initial: T,
        codec: C,
    ) -> Self {
        let snapshots = DurableCell::with_codec(
            Arc::clone(&store),
            keys.snapshots,
            Initial::Value(vec![initial.clone()]),
            codec,
        );
        let cursor = DurableCell::new(store, keys.cursor, Initial::Value(0));
        Self {
            snapshots,
            cursor,
            seed: initial,
            validated: false,
        }
    }

    /// Returns the snapshot at the cursor.
    pub fn current(&mut self) -> &T {
        let index = self.cursor();
        &self.snapshots.read()[index]
    }

    /// Returns the cursor index.
    pub fn cursor(&mut self) -> usize {
        self.validate();
        *self.cursor.read()
    }

    /// Number of snapshots. Never zero, so there is no `is_empty`.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&mut self) -> usize {
        self.validate();
        self.snapshots.read().len()
    }

    /// All snapshots, oldest first.
    pub fn snapshots(&mut self) -> &[T] {
        self.validate();
        self.snapshots.read()
    }

    /// Appends `value` after the cursor and moves the cursor to it.
    ///
    /// Snapshots after the cursor are discarded first. Both cells are
    /// persisted; the in-memory history is updated even if persisting fails.
    ///
    /// # Errors
    ///
    /// Returns the first persistence error of the two cells.
    pub fn commit(&mut self, value: T) -> Result<()> {
        let cursor = self.cursor();
        let saved_snapshots = self.snapshots.modify(|snapshots| {
            snapshots.truncate(cursor + 1);
            snapshots.push(value);
        });
        let tail = self.snapshots.read().len() - 1;
        let saved_cursor = self.cursor.write(tail);
        tracing::debug!(
            "Committed snapshot {tail} to '{}' (from cursor {cursor})",
            self.snapshots.key()
        );
        saved_snapshots.and(saved_cursor)
    }

    /// Commits `f(current)`, evaluated against the snapshot at the cursor
    /// when this is called.
    ///
    /// # Errors
    ///
    /// Same as [`HistoryCursor::commit`].
    pub fn commit_with<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&T) -> T,
    {
        let next = f(self.current());
        self.commit(next)
    }

    /// Moves the cursor to `index` without changing the snapshots.
    ///
    /// # Errors
    ///
    /// Returns `StateError::OutOfRange` (leaving everything unchanged) if
    /// `index >= len`, or a persistence error for the cursor cell.
    pub fn go_to(&mut self, index: usize) -> Result<()> {
        let len = self.len();
        if index >= len {
            return Err(StateError::OutOfRange { index, len });
        }
        self.cursor.write(index)
    }

    /// Replaces the whole history with a single snapshot at cursor 0.
    ///
    /// # Errors
    ///
    /// Returns the first persistence error of the two cells.
    pub fn reset(&mut self, initial: T) -> Result<()> {
        let saved_snapshots = self.snapshots.write(vec![initial]);
        let saved_cursor = self.cursor.write(0);
        self.validated = true;
        tracing::debug!("Reset history '{}'", self.snapshots.key());
        saved_snapshots.and(saved_cursor)
    }

    /// Navigation info for the snapshot at `index`, if it exists.
    pub fn position_of(&mut self, index: usize) -> Option<StepPosition> {
        let cursor = self.cursor();
        (index < self.len()).then_some(StepPosition {
            index,
            is_current: index == cursor,
        })
    }

    /// Navigation info for every snapshot, oldest first.
    pub fn positions(&mut self) -> Vec<StepPosition> {
        let cursor = self.cursor();
        (0..self.len())
            .map(|index| StepPosition {
                index,
                is_current: index == cursor,
            })
            .collect()
    }

    /// Whether there is an earlier snapshot to move back to.
    pub fn can_undo(&mut self) -> bool {
        self.cursor() > 0
    }

    /// Whether there is a later snapshot to move forward to.
    pub fn can_redo(&mut self) -> bool {
        self.cursor() + 1 < self.len()
    }

    /// Moves the cursor one snapshot back. Returns `Ok(false)` at the start.
    ///
    /// # Errors
    ///
    /// Returns a persistence error for the cursor cell.
    pub fn undo(&mut self) -> Result<bool> {
        if !self.can_undo() {
            return Ok(false);
        }
        let target = self.cursor() - 1;
        self.go_to(target).map(|()| true)
    }

    /// Moves the cursor one snapshot forward. Returns `Ok(false)` at the tail.
    ///
    /// # Errors
    ///
    /// Returns a persistence error for the cursor cell.
    pub fn redo(&mut self) -> Result<bool> {
        if !self.can_redo() {
            return Ok(false);
        }
        let target = self.cursor() + 1;
        self.go_to(target).map(|()| true)
    }

    /// Loads both cells and repairs stored state that breaks the invariants.
    ///
    /// Repairs are in memory only; the next commit or move persists them.
    fn validate(&mut self) {
        if self.validated {
            return;
        }
        self.validated = true;

        if self.snapshots.read().is_empty() {
            tracing::warn!(
                "Stored history '{}' is empty, starting from the initial snapshot",
                self.snapshots.key()
            );
            self.snapshots.replace_cached(vec![self.seed.clone()]);
        }

        let len = self.snapshots.read().len();
        let cursor = *self.cursor.read();
        if cursor >= len {
            tracing::warn!(
                "Stored cursor {cursor} for '{}' is past {len} snapshots, moving it to the last one",
                self.snapshots.key()
            );
            self.cursor.replace_cached(len - 1);
        }
    }
}
