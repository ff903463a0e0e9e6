//! Incremental cache for merged base-plus-overlay artifacts.
//!
//! A [`CacheIndex`] maps each base document, keyed by its path relative to
//! the project root, to a [`CacheEntry`] recording the modification times of
//! the base and of every overlay, in order. A lookup whose inputs still match
//! that signature reuses the artifact on disk; anything else triggers a fresh
//! merge. At the end of a run [`CacheIndex::flush`] deletes the artifacts of
//! entries nobody asked for and writes the index back to disk.

#![warn(missing_docs)]

pub mod context;
pub mod entry;
pub mod error;
pub mod gc;
pub mod index;

pub use context::CacheContext;
pub use entry::{CacheEntry, OverlaySignature};
pub use error::{CacheError, EntryError, OverlayError};
pub use gc::FlushReport;
pub use index::CacheIndex;
