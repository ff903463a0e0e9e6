//! Error types for document loading and overlay application.

use std::path::PathBuf;

/// Errors that can occur while reading a structured document from disk.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// The document could not be read.
    #[error("failed to read document {path}: {source}")]
    Io {
        /// The document path.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The document is not valid JSON.
    #[error("failed to parse document {path}: {source}")]
    Parse {
        /// The document path.
        path: PathBuf,
        /// The underlying JSON error.
        source: serde_json::Error,
    },
}

/// Errors that can occur while applying an instruction script.
#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    /// The `$instructions` value is not a well-formed instruction list.
    #[error("malformed instruction script: {reason}")]
    Malformed {
        /// Description of the problem.
        reason: String,
    },

    /// A path is not a valid JSON Pointer.
    #[error("invalid pointer '{pointer}': must be empty or start with '/'")]
    InvalidPointer {
        /// The offending pointer.
        pointer: String,
    },

    /// The addressed location does not exist.
    #[error("no value at '{pointer}'")]
    NotFound {
        /// The pointer that failed to resolve.
        pointer: String,
    },

    /// The addressed value has the wrong type for the operation.
    #[error("value at '{pointer}' is not {expected}")]
    TypeMismatch {
        /// The pointer of the mismatching value.
        pointer: String,
        /// The expected kind of value (e.g. "an array").
        expected: &'static str,
    },

    /// An array index is not a number or lies outside the array.
    #[error("index '{token}' out of bounds at '{pointer}' (length {len})")]
    IndexOutOfBounds {
        /// The array's pointer.
        pointer: String,
        /// The offending reference token.
        token: String,
        /// Length of the array.
        len: usize,
    },

    /// A `test` instruction found a different value.
    #[error("test failed at '{pointer}'")]
    TestFailed {
        /// The tested pointer.
        pointer: String,
    },
}
