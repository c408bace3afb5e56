//! Checkpoint error types.

use crate::error::TraceError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CheckpointError {
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),

    #[error("Unsupported checkpoint version {found}, supported: {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },

    /// The saved dictionary contradicts itself.
    #[error("Checkpoint dictionary is inconsistent: {0}")]
    InvalidDictionary(#[source] TraceError),

    /// A saved record does not fit the dictionary or the records before it.
    #[error("Checkpoint record {index} is invalid: {error}")]
    InvalidRecord {
        index: usize,
        #[source]
        error: TraceError,
    },
}
