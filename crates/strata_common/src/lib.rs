//! Shared foundational types used across the Strata workspace.
//!
//! This crate provides the [`Locator`] that maps between absolute paths and
//! paths relative to a project root, and helpers for reading file
//! modification timestamps in UTC.

#![warn(missing_docs)]

pub mod paths;
pub mod time;

pub use paths::Locator;
pub use time::file_modified;
