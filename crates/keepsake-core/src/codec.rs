/// Codecs converting typed values to and from persisted text.
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// An encode/decode pair for values of type `T`.
///
/// Round-trip fidelity (`decode(encode(v)) == v`) is the implementor's
/// contract; cells do not check it.
pub trait Codec<T> {
    fn encode(&self, value: &T) -> Result<String>;
    fn decode(&self, text: &str) -> Result<T>;
}

/// Compact JSON via `serde_json`. The default codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl<T: Serialize + DeserializeOwned> Codec<T> for JsonCodec {
    fn encode(&self, value: &T) -> Result<String> {
        serde_json::to_string(value).context("Failed to serialize value as JSON")
    }

    fn decode(&self, text: &str) -> Result<T> {
        serde_json::from_str(text).context("Failed to deserialize JSON value")
    }
}

/// Pretty-printed JSON. Decodes anything `JsonCodec` writes and vice versa.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrettyJsonCodec;

impl<T: Serialize + DeserializeOwned> Codec<T> for PrettyJsonCodec {
    fn encode(&self, value: &T) -> Result<String> {
        serde_json::to_string_pretty(value).context("Failed to serialize value as JSON")
    }

    fn decode(&self, text: &str) -> Result<T> {
        serde_json::from_str(text).context("Failed to deserialize JSON value")
    }
}

/// A codec built from a caller-supplied function pair.
#[derive(Clone)]
pub struct FnCodec<E, D> {
    encode: E,
    decode: D,
}

impl<E, D> FnCodec<E, D> {
    pub fn new(encode: E, decode: D) -> Self {
        Self { encode, decode }
    }
}

impl<E, D> std::fmt::Debug for FnCodec<E, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnCodec").finish_non_exhaustive()
    }
}

impl<T, E, D> Codec<T> for FnCodec<E, D>
where
    E: Fn(&T) -> String,
    D: Fn(&str) -> Result<T>,
{
    fn encode(&self, value: &T) -> Result<String> {
        Ok((self.encode)(value))
    }

    fn decode(&self, text: &str) -> Result<T> {
        (self.decode)(text)
    }
}
