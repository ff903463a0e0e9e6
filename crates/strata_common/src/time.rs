//! File modification timestamps.

use std::path::Path;

use chrono::{DateTime, Utc};

/// Returns the last-modification time of `path` in UTC.
///
/// Returns `None` if the file does not exist or the platform cannot report
/// a modification time.
pub fn file_modified(path: &Path) -> Option<DateTime<Utc>> {
    let modified = std::fs::metadata(path).and_then(|m| m.modified()).ok()?;
    Some(DateTime::<Utc>::from(modified))
}
