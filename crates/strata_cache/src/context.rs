//! Explicit cache context shared by every cache operation.

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use strata_common::Locator;

/// Directory below the cache root holding artifacts of bases outside the
/// project root.
const EXTERNAL_DIR: &str = "_external";

/// The project root and cache root a cache operates against.
///
/// Every path the cache records is relative to the project root; every
/// artifact lives below the cache root.
#[derive(Debug, Clone)]
pub struct CacheContext {
    /// Resolves paths against the project root.
    locator: Locator,

    /// Absolute directory holding all artifacts.
    cache_root: PathBuf,
}

impl CacheContext {
    /// Creates a context for `root`, with artifacts stored under `cache_root`.
    ///
    /// A relative `cache_root` is interpreted against `root`.
    pub fn new(root: impl Into<PathBuf>, cache_root: impl AsRef<Path>) -> Self {
        let locator = Locator::new(root);
        let cache_root = locator.absolutize(cache_root.as_ref());
        Self { locator, cache_root }
    }

    /// Returns the path locator.
    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    /// Returns the project root.
    pub fn root(&self) -> &Path {
        self.locator.root()
    }

    /// Returns the absolute cache root.
    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    /// Resolves `path` to normalized absolute form.
    pub fn absolutize(&self, path: &Path) -> PathBuf {
        self.locator.absolutize(path)
    }

    /// Expresses `path` relative to the project root where possible.
    pub fn relativize(&self, path: &Path) -> PathBuf {
        self.locator.relativize(path)
    }

    /// Returns the logical key for a base document.
    pub fn key_for(&self, base: &Path) -> PathBuf {
        self.relativize(base)
    }

    /// Returns the absolute artifact location derived from a logical key.
    ///
    /// Relative keys are mirrored below the cache root. Keys that are still
    /// absolute (bases outside the project root) go below
    /// `<cache_root>/_external`, keeping only their normal components. A
    /// relative key whose first component starts with `_` gets one more `_`,
    /// so no relative key can land in the external namespace and distinct
    /// keys never share an artifact.
    pub fn artifact_for_key(&self, key: &Path) -> PathBuf {
        let mut artifact = self.cache_root.clone();
        let mut parts = key.components().filter_map(|component| match component {
            Component::Normal(part) => Some(part),
            _ => None,
        });

        if key.is_absolute() {
            artifact.push(EXTERNAL_DIR);
        } else if let Some(first) = parts.next() {
            if first.as_encoded_bytes().starts_with(b"_") {
                let mut escaped = OsString::from("_");
                escaped.push(first);
                artifact.push(escaped);
            } else {
                artifact.push(first);
            }
        }
        artifact.extend(parts);
        artifact
    }
}
