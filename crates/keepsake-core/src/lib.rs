/// Persistent, versioned state engine.
///
/// Provides a `DurableCell` that keeps one value in sync with a durable
/// key-value medium, and a `HistoryCursor` that layers a linear, navigable
/// snapshot history with a movable cursor on top of two such cells.
/// Both the history and the cursor position survive process restarts.
pub mod cell;
pub mod codec;
pub mod error;
pub mod history;

pub use cell::{DurableCell, Initial};
pub use codec::{Codec, FnCodec, JsonCodec, PrettyJsonCodec};
pub use error::{Result, StateError};
pub use history::{HistoryCursor, HistoryKeys, StepPosition};
pub use keepsake_store::{KeyValueStore, MemoryStore, RedbStore};
