//! Errors of the BTF text reader and writer.

use crate::error::TraceError;
use thiserror::Error;

/// Failure to read or write a trace as BTF text.
#[derive(Debug, Error)]
pub enum TextError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Trace(#[from] TraceError),

    /// The header could not be understood; no record was read.
    #[error("invalid header: {0}")]
    InvalidHeader(String),
}
