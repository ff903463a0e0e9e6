//! Path resolution against a fixed project root.
//!
//! Cache keys and every path recorded in the cache index are stored relative
//! to the project root so that a project directory can be moved without
//! invalidating its cache. The [`Locator`] performs the conversions in both
//! directions. All normalization is lexical: the filesystem is never touched,
//! so paths to files that do not exist yet resolve the same way as existing
//! ones.

use std::path::{Component, Path, PathBuf};

/// Converts paths between absolute and root-relative form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    /// Normalized project root.
    root: PathBuf,
}

impl Locator {
    /// Creates a locator for the given project root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: normalize(&root.into()),
        }
    }

    /// Returns the normalized project root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves `path` to a normalized absolute path.
    ///
    /// Relative paths are interpreted against the project root.
    pub fn absolutize(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            normalize(path)
        } else {
            normalize(&self.root.join(path))
        }
    }

    /// Expresses `path` relative to the project root.
    ///
    /// Paths that resolve outside the root cannot be made relative and are
    /// returned in absolute form.
    pub fn relativize(&self, path: &Path) -> PathBuf {
        let absolute = self.absolutize(path);
        match absolute.strip_prefix(&self.root) {
            Ok(relative) => relative.to_path_buf(),
            Err(_) => absolute,
        }
    }

    /// Returns `true` if `path` resolves to a location inside the project root.
    pub fn is_under_root(&self, path: &Path) -> bool {
        self.absolutize(path).starts_with(&self.root)
    }
}

/// Lexically normalizes a path, dropping `.` components and folding `..`
/// into the preceding component.
///
/// A `..` directly below the filesystem root is discarded. Leading `..`
/// components of a relative path are kept.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}
