//! Error types for cache operations.

use std::path::PathBuf;

use strata_merge::{ApplyError, DocumentError};

/// Errors that can occur while loading or persisting the cache index.
///
/// Lookups never return these: a lookup that cannot produce an artifact
/// reports a cache miss instead.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// An I/O error occurred while reading or writing the index.
    #[error("cache I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The persisted index could not be parsed.
    #[error("failed to parse cache index {path}: {reason}")]
    IndexParse {
        /// The index file.
        path: PathBuf,
        /// Description of the parse failure.
        reason: String,
    },

    /// The index could not be serialized.
    #[error("serialization error: {reason}")]
    Serialization {
        /// Description of the serialization failure.
        reason: String,
    },
}

/// Errors that abort the construction of a cache entry.
///
/// When one of these occurs no artifact is left behind and the index is not
/// modified.
#[derive(Debug, thiserror::Error)]
pub enum EntryError {
    /// The artifact path has no containing directory.
    #[error("cannot determine the directory of artifact {artifact}")]
    DirectoryResolution {
        /// The artifact path.
        artifact: PathBuf,
    },

    /// The base document's modification time could not be read.
    #[error("cannot read modification time of base document {path}")]
    BaseTimestamp {
        /// The base document path.
        path: PathBuf,
    },

    /// The base document could not be loaded.
    #[error("failed to load base document: {0}")]
    BaseParse(#[source] DocumentError),

    /// The artifact or its directory could not be written.
    #[error("failed to write artifact {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

/// Errors that cause a single overlay to be skipped.
///
/// These are logged and never abort the entry being built.
#[derive(Debug, thiserror::Error)]
pub enum OverlayError {
    /// The overlay document could not be loaded.
    #[error("{0}")]
    Parse(#[from] DocumentError),

    /// The overlay's instruction script failed.
    #[error("failed to apply instructions from {path}: {source}")]
    Apply {
        /// The overlay path.
        path: PathBuf,
        /// The underlying instruction error.
        source: ApplyError,
    },
}
