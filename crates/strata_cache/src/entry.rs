//! A single cached artifact and the signature of the inputs that built it.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strata_common::file_modified;
use strata_merge::{apply_overlay, load_document, write_document};
use tracing::{debug, warn};

use crate::context::CacheContext;
use crate::error::{EntryError, OverlayError};

/// Recorded identity of one overlay at the time of the merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlaySignature {
    /// Overlay path, relative to the project root.
    pub path: PathBuf,

    /// Modification time of the overlay, `None` if it could not be read.
    pub modified: Option<DateTime<Utc>>,
}

/// Provenance of one merged artifact.
///
/// Only the artifact path and the input signature are persisted. The
/// "used this run" flag starts out `false` whenever an index is loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Artifact path, relative to the project root.
    pub artifact: PathBuf,

    /// Modification time of the base document when the artifact was built.
    pub base_modified: DateTime<Utc>,

    /// Overlay signatures in the order the overlays were applied.
    pub overlays: Vec<OverlaySignature>,

    #[serde(skip)]
    used: bool,
}

impl CacheEntry {
    /// Merges `base` with `overlays` into a new artifact at `artifact`.
    ///
    /// The overlay signature is recorded before any overlay is read, so it
    /// reflects the requested inputs even when some overlays are skipped.
    /// Overlays that fail to parse or apply are logged and skipped. Failures
    /// concerning the artifact location or the base document abort the
    /// whole entry without leaving an artifact behind.
    pub fn create(
        ctx: &CacheContext,
        artifact: &Path,
        base: &Path,
        overlays: &[PathBuf],
    ) -> Result<Self, EntryError> {
        let artifact = ctx.absolutize(artifact);
        let dir = artifact
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .ok_or_else(|| EntryError::DirectoryResolution {
                artifact: artifact.clone(),
            })?;

        let base = ctx.absolutize(base);
        let base_modified =
            file_modified(&base).ok_or_else(|| EntryError::BaseTimestamp { path: base.clone() })?;
        let mut document = load_document(&base).map_err(EntryError::BaseParse)?;

        let overlays: Vec<PathBuf> = overlays.iter().map(|p| ctx.absolutize(p)).collect();
        let signatures = overlays
            .iter()
            .map(|path| OverlaySignature {
                path: ctx.relativize(path),
                modified: file_modified(path),
            })
            .collect();

        fs::create_dir_all(dir).map_err(|e| EntryError::Io {
            path: dir.to_path_buf(),
            source: e,
        })?;
        let file = File::create(&artifact).map_err(|e| EntryError::Io {
            path: artifact.clone(),
            source: e,
        })?;

        for (position, overlay) in overlays.iter().enumerate() {
            match merge_overlay(&mut document, overlay) {
                Ok(()) => debug!("applied overlay #{position} {}", overlay.display()),
                Err(e) => warn!("skipping overlay #{position}: {e}"),
            }
        }

        if let Err(e) = write_document(BufWriter::new(file), &document) {
            // Best effort; the write error is what gets reported.
            let _ = fs::remove_file(&artifact);
            return Err(EntryError::Io {
                path: artifact,
                source: e,
            });
        }

        Ok(Self {
            artifact: ctx.relativize(&artifact),
            base_modified,
            overlays: signatures,
            used: false,
        })
    }

    /// Returns `true` if this entry is still valid for the given inputs.
    ///
    /// The artifact must exist, the base must carry the recorded
    /// modification time, and the overlays must match the recorded
    /// signatures one-for-one at the same positions. The same overlays in a
    /// different order do not match.
    pub fn matches(&self, ctx: &CacheContext, base: &Path, overlays: &[PathBuf]) -> bool {
        if !self.artifact_path(ctx).exists() {
            return false;
        }
        if file_modified(&ctx.absolutize(base)) != Some(self.base_modified) {
            return false;
        }
        if self.overlays.len() != overlays.len() {
            return false;
        }
        self.overlays.iter().zip(overlays).all(|(recorded, current)| {
            let current = ctx.absolutize(current);
            ctx.absolutize(&recorded.path) == current && file_modified(&current) == recorded.modified
        })
    }

    /// Returns the absolute artifact path.
    pub fn artifact_path(&self, ctx: &CacheContext) -> PathBuf {
        ctx.absolutize(&self.artifact)
    }

    /// Returns `true` if the entry was looked up or created during this run.
    pub fn is_used(&self) -> bool {
        self.used
    }

    pub(crate) fn mark_used(&mut self) {
        self.used = true;
    }
}

fn merge_overlay(document: &mut Value, overlay: &Path) -> Result<(), OverlayError> {
    let patch = load_document(overlay)?;
    apply_overlay(document, patch).map_err(|source| OverlayError::Apply {
        path: overlay.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::FileTime;
    use serde_json::json;

    fn write_at(path: &Path, content: &str, secs: i64) {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).unwrap();
        }
        fs::write(path, content).unwrap();
        filetime::set_file_mtime(path, FileTime::from_unix_time(secs, 0)).unwrap();
    }

    fn read_json(path: &Path) -> Value {
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    fn setup() -> (tempfile::TempDir, CacheContext) {
        let dir = tempfile::tempdir().unwrap();
        let ctx = CacheContext::new(dir.path(), ".strata/cache");
        write_at(
            &dir.path().join("defs/items.json"),
            r#"{"sword": {"damage": 4, "tags": ["melee"]}}"#,
            1_000,
        );
        (dir, ctx)
    }

    #[test]
    fn create_merges_overlays_in_order() {
        let (dir, ctx) = setup();
        write_at(&dir.path().join("mods/a.json"), r#"{"sword": {"damage": 5}}"#, 2_000);
        write_at(&dir.path().join("mods/b.json"), r#"{"sword": {"damage": 7, "tags": ["rare"]}}"#, 3_000);

        let artifact = ctx.artifact_for_key(Path::new("defs/items.json"));
        let entry = CacheEntry::create(
            &ctx,
            &artifact,
            Path::new("defs/items.json"),
            &[PathBuf::from("mods/a.json"), PathBuf::from("mods/b.json")],
        )
        .unwrap();

        assert_eq!(
            read_json(&artifact),
            json!({"sword": {"damage": 7, "tags": ["rare"]}})
        );
        assert_eq!(entry.artifact, PathBuf::from(".strata/cache/defs/items.json"));
        assert_eq!(entry.base_modified.timestamp(), 1_000);
        assert_eq!(entry.overlays.len(), 2);
        assert_eq!(entry.overlays[0].path, PathBuf::from("mods/a.json"));
        assert_eq!(entry.overlays[1].modified.unwrap().timestamp(), 3_000);
        assert!(!entry.is_used());
    }

    #[test]
    fn broken_overlay_is_skipped_but_recorded() {
        let (dir, ctx) = setup();
        write_at(&dir.path().join("mods/bad.json"), "{not json", 2_000);
        write_at(&dir.path().join("mods/good.json"), r#"{"sword": {"damage": 9}}"#, 2_000);

        let artifact = ctx.artifact_for_key(Path::new("defs/items.json"));
        let entry = CacheEntry::create(
            &ctx,
            &artifact,
            Path::new("defs/items.json"),
            &[PathBuf::from("mods/bad.json"), PathBuf::from("mods/good.json")],
        )
        .unwrap();

        assert_eq!(read_json(&artifact)["sword"]["damage"], 9);
        assert_eq!(entry.overlays.len(), 2);
        assert_eq!(entry.overlays[0].path, PathBuf::from("mods/bad.json"));
    }

    #[test]
    fn missing_overlay_is_recorded_without_timestamp() {
        let (_dir, ctx) = setup();
        let artifact = ctx.artifact_for_key(Path::new("defs/items.json"));
        let overlays = [PathBuf::from("mods/absent.json")];
        let entry =
            CacheEntry::create(&ctx, &artifact, Path::new("defs/items.json"), &overlays).unwrap();

        assert_eq!(entry.overlays[0].modified, None);
        assert!(entry.matches(&ctx, Path::new("defs/items.json"), &overlays));
    }

    #[test]
    fn failing_instruction_script_is_skipped() {
        let (dir, ctx) = setup();
        write_at(
            &dir.path().join("mods/script.json"),
            r#"{"$instructions": [
                {"op": "set", "path": "/sword/damage", "value": 100},
                {"op": "remove", "path": "/shield"}
            ]}"#,
            2_000,
        );
        write_at(
            &dir.path().join("mods/ok.json"),
            r#"{"$instructions": [{"op": "append", "path": "/sword/tags", "value": "rare"}]}"#,
            2_000,
        );

        let artifact = ctx.artifact_for_key(Path::new("defs/items.json"));
        CacheEntry::create(
            &ctx,
            &artifact,
            Path::new("defs/items.json"),
            &[PathBuf::from("mods/script.json"), PathBuf::from("mods/ok.json")],
        )
        .unwrap();

        assert_eq!(
            read_json(&artifact),
            json!({"sword": {"damage": 4, "tags": ["melee", "rare"]}})
        );
    }

    #[test]
    fn broken_base_aborts_without_artifact() {
        let (dir, ctx) = setup();
        write_at(&dir.path().join("defs/broken.json"), "[1, 2", 1_000);

        let artifact = ctx.artifact_for_key(Path::new("defs/broken.json"));
        let err = CacheEntry::create(&ctx, &artifact, Path::new("defs/broken.json"), &[])
            .unwrap_err();

        assert!(matches!(err, EntryError::BaseParse(_)));
        assert!(!artifact.exists());
        assert!(!ctx.cache_root().exists());
    }

    #[test]
    fn missing_base_aborts() {
        let (_dir, ctx) = setup();
        let artifact = ctx.artifact_for_key(Path::new("defs/absent.json"));
        let err = CacheEntry::create(&ctx, &artifact, Path::new("defs/absent.json"), &[])
            .unwrap_err();
        assert!(matches!(err, EntryError::BaseTimestamp { .. }));
    }

    #[test]
    fn artifact_without_directory_aborts() {
        let (_dir, ctx) = setup();
        let err = CacheEntry::create(&ctx, Path::new("/"), Path::new("defs/items.json"), &[])
            .unwrap_err();
        assert!(matches!(err, EntryError::DirectoryResolution { .. }));
    }

    #[test]
    fn matches_detects_each_kind_of_change() {
        let (dir, ctx) = setup();
        write_at(&dir.path().join("mods/a.json"), r#"{"a": 1}"#, 2_000);
        write_at(&dir.path().join("mods/b.json"), r#"{"b": 1}"#, 2_000);
        let base = Path::new("defs/items.json");
        let ab = [PathBuf::from("mods/a.json"), PathBuf::from("mods/b.json")];
        let artifact = ctx.artifact_for_key(base);
        let entry = CacheEntry::create(&ctx, &artifact, base, &ab).unwrap();

        assert!(entry.matches(&ctx, base, &ab));
        assert!(entry.matches(&ctx, &dir.path().join(base), &ab));

        let ba = [PathBuf::from("mods/b.json"), PathBuf::from("mods/a.json")];
        assert!(!entry.matches(&ctx, base, &ba));
        assert!(!entry.matches(&ctx, base, &ab[..1]));

        filetime::set_file_mtime(dir.path().join("mods/b.json"), FileTime::from_unix_time(2_500, 0))
            .unwrap();
        assert!(!entry.matches(&ctx, base, &ab));
    }

    #[test]
    fn matches_fails_when_base_touched() {
        let (dir, ctx) = setup();
        let base = Path::new("defs/items.json");
        let artifact = ctx.artifact_for_key(base);
        let entry = CacheEntry::create(&ctx, &artifact, base, &[]).unwrap();
        assert!(entry.matches(&ctx, base, &[]));

        filetime::set_file_mtime(dir.path().join(base), FileTime::from_unix_time(1_001, 0)).unwrap();
        assert!(!entry.matches(&ctx, base, &[]));
    }

    #[test]
    fn matches_fails_when_artifact_deleted() {
        let (_dir, ctx) = setup();
        let base = Path::new("defs/items.json");
        let artifact = ctx.artifact_for_key(base);
        let entry = CacheEntry::create(&ctx, &artifact, base, &[]).unwrap();
        fs::remove_file(&artifact).unwrap();
        assert!(!entry.matches(&ctx, base, &[]));
    }

    #[test]
    fn used_flag_is_not_serialized() {
        let (_dir, ctx) = setup();
        let base = Path::new("defs/items.json");
        let mut entry = CacheEntry::create(&ctx, &ctx.artifact_for_key(base), base, &[]).unwrap();
        entry.mark_used();

        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("used").is_none());
        let back: CacheEntry = serde_json::from_value(json).unwrap();
        assert!(!back.is_used());
        assert_eq!(back.base_modified, entry.base_modified);
    }
}
