//! Error types for the flash dump transport

use std::io;
use thiserror::Error;

/// Flash dump errors
#[derive(Debug, Error)]
pub enum DumpError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Dump file could not be read
    #[error("Failed to read '{path}': {source}")]
    OpenFailed {
        path: String,
        #[source]
        source: io::Error,
    },

    /// Dump file is empty
    #[error("Flash dump '{0}' is empty")]
    Empty(String),

    /// Dump does not fit the flash window
    #[error("Flash dump of {len} bytes exceeds the {max} byte flash window")]
    TooLarge { len: usize, max: usize },

    /// Missing required parameter
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    /// Invalid parameter value
    #[error("Invalid parameter '{name}': {message}")]
    InvalidParameter { name: &'static str, message: String },
}

/// Result type for flash dump operations
pub type Result<T> = std::result::Result<T, DumpError>;
