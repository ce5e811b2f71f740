/// Errors surfaced by cells and histories.
///
/// Decode failures never appear here: a value that cannot be decoded is
/// logged and replaced by the cell's default.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateError {
    /// The durable medium rejected a write. The in-memory value was still updated.
    #[error("failed to persist '{key}'")]
    Persist {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    /// The codec could not encode the new value. The in-memory value was still updated.
    #[error("failed to encode value for '{key}'")]
    Encode {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    /// A history index outside `0..len`.
    #[error("history index {index} is out of range for {len} snapshots")]
    OutOfRange { index: usize, len: usize },
}

impl StateError {
    /// Whether the in-memory state changed even though this error was returned.
    pub fn is_write_failure(&self) -> bool {
        matches!(self, Self::Persist { .. } | Self::Encode { .. })
    }
}

pub type Result<T> = std::result::Result<T, StateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_range_message() {
        let err = StateError::OutOfRange { index: 4, len: 4 };
        assert_eq!(
            err.to_string(),
            "history index 4 is out of range for 4 snapshots"
        );
        assert!(!err.is_write_failure());
    }

    #[test]
    fn test_persist_keeps_source() {
        let err = StateError::Persist {
            key: "history".to_string(),
            source: anyhow::anyhow!("disk full"),
        };
        assert_eq!(err.to_string(), "failed to persist 'history'");
        let source = std::error::Error::source(&err).expect("source");
        assert_eq!(source.to_string(), "disk full");
        assert!(err.is_write_failure());
    }
}
