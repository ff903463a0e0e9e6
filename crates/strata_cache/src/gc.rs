//! End-of-run garbage collection and persistence.
//!
//! Entries that were not looked up during the run are dropped from the
//! index together with their artifacts. Directories emptied by a deletion
//! are removed bottom-up, stopping at the first non-empty directory or at
//! the cache root, which is never removed.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::context::CacheContext;
use crate::error::CacheError;
use crate::index::CacheIndex;

/// Outcome of a [`CacheIndex::flush`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Entries used this run and kept in the index.
    pub kept: usize,
    /// Unused entries removed from the index.
    pub removed: usize,
    /// Deletions that failed (logged, not fatal).
    pub errors: usize,
}

impl CacheIndex {
    /// Garbage-collects unused entries and writes the index to `destination`.
    ///
    /// Call once, after every lookup of the run. Failures to delete stale
    /// files are logged and counted; only failing to write the index is an
    /// error.
    pub fn flush(
        &mut self,
        ctx: &CacheContext,
        destination: &Path,
    ) -> Result<FlushReport, CacheError> {
        let report = self.collect_garbage(ctx);
        self.save(destination)?;
        Ok(report)
    }

    /// Removes every entry not used this run, deleting its artifact and
    /// pruning directories left empty.
    pub fn collect_garbage(&mut self, ctx: &CacheContext) -> FlushReport {
        let entries = self.entries_mut();
        let unused: Vec<PathBuf> = entries
            .iter()
            .filter(|(_, entry)| !entry.is_used())
            .map(|(key, _)| key.clone())
            .collect();

        let mut report = FlushReport::default();
        for key in unused {
            let Some(entry) = entries.remove(&key) else {
                continue;
            };
            report.removed += 1;

            let artifact = entry.artifact_path(ctx);
            match fs::remove_file(&artifact) {
                Ok(()) => info!("removed stale artifact {}", artifact.display()),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    warn!("failed to remove {}: {e}", artifact.display());
                    report.errors += 1;
                }
            }
            if let Some(dir) = artifact.parent() {
                report.errors += prune_empty_dirs(dir, ctx.cache_root());
            }
        }

        report.kept = entries.len();
        report
    }
}

/// Removes `start` and its ancestors while they are empty, never touching
/// `cache_root` or anything outside it. Returns the number of failures.
fn prune_empty_dirs(start: &Path, cache_root: &Path) -> usize {
    let mut current = Some(start);
    while let Some(dir) = current {
        if dir == cache_root || !dir.starts_with(cache_root) {
            break;
        }
        match fs::read_dir(dir) {
            Ok(mut children) => {
                if children.next().is_some() {
                    break;
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                current = dir.parent();
                continue;
            }
            Err(e) => {
                warn!("failed to inspect {}: {e}", dir.display());
                return 1;
            }
        }
        if let Err(e) = fs::remove_dir(dir) {
            warn!("failed to remove directory {}: {e}", dir.display());
            return 1;
        }
        debug!("removed empty directory {}", dir.display());
        current = dir.parent();
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::FileTime;

    fn write_at(path: &Path, content: &str, secs: i64) {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).unwrap();
        }
        fs::write(path, content).unwrap();
        filetime::set_file_mtime(path, FileTime::from_unix_time(secs, 0)).unwrap();
    }

    fn setup() -> (tempfile::TempDir, CacheContext) {
        let dir = tempfile::tempdir().unwrap();
        let ctx = CacheContext::new(dir.path(), ".strata/cache");
        write_at(&dir.path().join("defs/deep/nested/items.json"), "{}", 1_000);
        write_at(&dir.path().join("defs/deep/units.json"), "{}", 1_000);
        write_at(&dir.path().join("defs/spells.json"), "{}", 1_000);
        (dir, ctx)
    }

    #[test]
    fn unused_entries_are_removed_with_empty_dirs() {
        let (dir, ctx) = setup();
        let mut index = CacheIndex::new();
        let items = index
            .get_or_create_artifact(&ctx, Path::new("defs/deep/nested/items.json"), &[])
            .unwrap();
        let spells = index
            .get_or_create_artifact(&ctx, Path::new("defs/spells.json"), &[])
            .unwrap();

        // Next run only touches spells.
        let mut next: CacheIndex =
            serde_json::from_value(serde_json::to_value(&index).unwrap()).unwrap();
        next.get_or_create_artifact(&ctx, Path::new("defs/spells.json"), &[]);
        let report = next.flush(&ctx, &dir.path().join(".strata/index.json")).unwrap();

        assert_eq!(report, FlushReport { kept: 1, removed: 1, errors: 0 });
        assert!(!items.exists());
        assert!(!ctx.cache_root().join("defs/deep").exists());
        assert!(spells.exists());
        assert!(ctx.cache_root().join("defs").exists());
        assert!(next.get(Path::new("defs/deep/nested/items.json")).is_none());
    }

    #[test]
    fn pruning_stops_at_non_empty_directory() {
        let (_dir, ctx) = setup();
        let mut index = CacheIndex::new();
        index.get_or_create_artifact(&ctx, Path::new("defs/deep/nested/items.json"), &[]);
        let units = index
            .get_or_create_artifact(&ctx, Path::new("defs/deep/units.json"), &[])
            .unwrap();

        let mut next: CacheIndex =
            serde_json::from_value(serde_json::to_value(&index).unwrap()).unwrap();
        next.get_or_create_artifact(&ctx, Path::new("defs/deep/units.json"), &[]);
        next.collect_garbage(&ctx);

        assert!(!ctx.cache_root().join("defs/deep/nested").exists());
        assert!(units.exists());
    }

    #[test]
    fn cache_root_is_never_removed() {
        let (_dir, ctx) = setup();
        let mut index = CacheIndex::new();
        index.get_or_create_artifact(&ctx, Path::new("defs/spells.json"), &[]);

        let mut next: CacheIndex =
            serde_json::from_value(serde_json::to_value(&index).unwrap()).unwrap();
        let report = next.collect_garbage(&ctx);

        assert_eq!(report.removed, 1);
        assert!(next.is_empty());
        assert!(ctx.cache_root().exists());
        assert!(!ctx.cache_root().join("defs").exists());
    }

    #[test]
    fn missing_artifact_is_not_an_error() {
        let (_dir, ctx) = setup();
        let mut index = CacheIndex::new();
        let artifact = index
            .get_or_create_artifact(&ctx, Path::new("defs/spells.json"), &[])
            .unwrap();
        fs::remove_file(&artifact).unwrap();

        let mut next: CacheIndex =
            serde_json::from_value(serde_json::to_value(&index).unwrap()).unwrap();
        let report = next.collect_garbage(&ctx);
        assert_eq!(report, FlushReport { kept: 0, removed: 1, errors: 0 });
    }

    #[test]
    fn failed_deletion_is_counted_and_pass_continues() {
        let (dir, ctx) = setup();
        let mut index = CacheIndex::new();
        let spells = index
            .get_or_create_artifact(&ctx, Path::new("defs/spells.json"), &[])
            .unwrap();
        let units = index
            .get_or_create_artifact(&ctx, Path::new("defs/deep/units.json"), &[])
            .unwrap();
        // A non-empty directory where the artifact should be cannot be
        // removed with `remove_file`.
        fs::remove_file(&spells).unwrap();
        fs::create_dir_all(spells.join("blocker")).unwrap();

        let mut next: CacheIndex =
            serde_json::from_value(serde_json::to_value(&index).unwrap()).unwrap();
        let destination = dir.path().join(".strata/index.json");
        let report = next.flush(&ctx, &destination).unwrap();

        assert_eq!(report, FlushReport { kept: 0, removed: 2, errors: 1 });
        assert!(spells.exists());
        assert!(!units.exists());
        assert!(next.is_empty());
        assert!(CacheIndex::load(&destination).unwrap().is_empty());
    }

    #[test]
    fn prune_ignores_paths_outside_cache_root() {
        let dir = tempfile::tempdir().unwrap();
        let outside = dir.path().join("outside/empty");
        fs::create_dir_all(&outside).unwrap();
        assert_eq!(prune_empty_dirs(&outside, &dir.path().join("cache")), 0);
        assert!(outside.exists());
    }

    #[test]
    fn flush_writes_only_kept_entries() {
        let (dir, ctx) = setup();
        let mut index = CacheIndex::new();
        index.get_or_create_artifact(&ctx, Path::new("defs/spells.json"), &[]);
        let destination = dir.path().join(".strata/index.json");
        index.flush(&ctx, &destination).unwrap();

        let reloaded = CacheIndex::load(&destination).unwrap();
        assert_eq!(reloaded.len(), 1);
        assert!(reloaded.get(Path::new("defs/spells.json")).is_some());
    }
}
