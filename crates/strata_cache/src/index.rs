//! The cache index: logical key to cache entry.
//!
//! The index is persisted as an indented JSON object keyed by base path
//! relative to the project root:
//!
//! ```json
//! {
//!   "defs/items.json": {
//!     "artifact": ".strata/cache/defs/items.json",
//!     "base_modified": "2024-05-01T10:00:00Z",
//!     "overlays": [
//!       { "path": "mods/a/items.json", "modified": "2024-05-02T08:30:00Z" }
//!     ]
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::context::CacheContext;
use crate::entry::CacheEntry;
use crate::error::CacheError;

/// Mapping from logical key to [`CacheEntry`].
///
/// Meant for a single caller per run: load, look up artifacts, then
/// [`flush`](CacheIndex::flush) once.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheIndex {
    entries: BTreeMap<PathBuf, CacheEntry>,
}

impl CacheIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the index persisted at `path`.
    ///
    /// A missing file yields an empty index. All loaded entries start out
    /// unused.
    pub fn load(path: &Path) -> Result<Self, CacheError> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let content = fs::read_to_string(path).map_err(|e| CacheError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| CacheError::IndexParse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Loads the index at `path`, falling back to an empty index if it
    /// cannot be read or parsed.
    ///
    /// Starting empty only costs a full rebuild, so a damaged index is
    /// logged and discarded.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            warn!("discarding cache index: {e}");
            Self::new()
        })
    }

    /// Writes the index to `path` as indented JSON.
    ///
    /// Creates the parent directory if it doesn't exist. Only persisted
    /// fields are written; nothing is garbage-collected.
    pub fn save(&self, path: &Path) -> Result<(), CacheError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| CacheError::Io {
                path: dir.to_path_buf(),
                source: e,
            })?;
        }
        let file = File::create(path).map_err(|e| CacheError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self).map_err(|e| CacheError::Serialization {
            reason: e.to_string(),
        })?;
        writer
            .write_all(b"\n")
            .and_then(|()| writer.flush())
            .map_err(|e| CacheError::Io {
                path: path.to_path_buf(),
                source: e,
            })
    }

    /// Returns the artifact path for `base` merged with `overlays`,
    /// building it if there is no valid cached one.
    ///
    /// Returns `None` if the artifact could not be built; the reason is
    /// logged and the index is left as it was.
    pub fn get_or_create_artifact(
        &mut self,
        ctx: &CacheContext,
        base: &Path,
        overlays: &[PathBuf],
    ) -> Option<PathBuf> {
        let base = ctx.absolutize(base);
        let key = ctx.key_for(&base);

        let existing = self.entries.get(&key);
        if existing.is_some_and(|entry| entry.matches(ctx, &base, overlays)) {
            debug!("cache hit for {}", key.display());
        } else {
            // A rebuilt entry keeps the artifact location of the one it replaces.
            let artifact = existing.map_or_else(
                || ctx.artifact_for_key(&key),
                |entry| entry.artifact_path(ctx),
            );
            match CacheEntry::create(ctx, &artifact, &base, overlays) {
                Ok(entry) => {
                    info!("built {} from {} overlay(s)", key.display(), overlays.len());
                    self.entries.insert(key.clone(), entry);
                }
                Err(e) => {
                    error!("failed to build artifact for {}: {e}", key.display());
                    return None;
                }
            }
        }

        let entry = self.entries.get_mut(&key)?;
        entry.mark_used();
        Some(entry.artifact_path(ctx))
    }

    /// Returns `true` if a valid cached artifact exists for `base` merged
    /// with `overlays`. Never builds anything and never marks entries used.
    pub fn has_valid_entry(&self, ctx: &CacheContext, base: &Path, overlays: &[PathBuf]) -> bool {
        let base = ctx.absolutize(base);
        self.entries
            .get(&ctx.key_for(&base))
            .is_some_and(|entry| entry.matches(ctx, &base, overlays))
    }

    /// Rewrites entries stored under absolute keys to root-relative form.
    ///
    /// The key, the artifact path and every overlay path of each such entry
    /// are made relative to the project root. Entries keyed outside the root
    /// are left untouched. Running it again changes nothing. Returns the
    /// number of entries that were re-keyed.
    pub fn relocate_absolute_keys_to_relative(&mut self, ctx: &CacheContext) -> usize {
        let absolute: Vec<PathBuf> = self
            .entries
            .keys()
            .filter(|key| key.is_absolute() && ctx.locator().is_under_root(key))
            .cloned()
            .collect();

        let mut relocated = 0;
        for old_key in absolute {
            let Some(mut entry) = self.entries.remove(&old_key) else {
                continue;
            };
            let new_key = ctx.relativize(&old_key);
            entry.artifact = ctx.relativize(&entry.artifact);
            for overlay in &mut entry.overlays {
                overlay.path = ctx.relativize(&overlay.path);
            }
            debug!("relocated {} to {}", old_key.display(), new_key.display());
            self.entries.insert(new_key, entry);
            relocated += 1;
        }
        relocated
    }

    /// Returns the entry stored under `key`.
    pub fn get(&self, key: &Path) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    /// Iterates over all entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&PathBuf, &CacheEntry)> {
        self.entries.iter()
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the index has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn entries_mut(&mut self) -> &mut BTreeMap<PathBuf, CacheEntry> {
        &mut self.entries
    }

    #[cfg(test)]
    pub(crate) fn insert(&mut self, key: PathBuf, entry: CacheEntry) {
        self.entries.insert(key, entry);
    }
}
