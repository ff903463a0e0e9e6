//! `strata check` — report stale resources without touching the cache.

use std::collections::BTreeSet;
use std::path::PathBuf;

use strata_cache::CacheIndex;

use crate::pipeline::Project;
use crate::GlobalArgs;

/// Runs the `strata check` command.
///
/// Returns exit code 0 if every resource has a valid cached artifact, 1 if
/// any would be rebuilt by `strata build`. Index entries no resource refers
/// to are listed as well, since the next build collects them.
pub fn run(global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project = Project::open(global)?;
    let index = CacheIndex::load_or_default(&project.index_path);
    let statuses = resource_status(&project, &index);

    if !global.quiet {
        for (base, fresh) in &statuses {
            let status = if *fresh { "fresh" } else { "stale" };
            println!("{status:>6} {base}");
        }
        for key in unreferenced_keys(&project, &index) {
            println!("{:>6} {}", "unused", key.display());
        }
    }
    Ok(if statuses.iter().all(|(_, fresh)| *fresh) { 0 } else { 1 })
}

/// Returns every resource's base path with whether its cache entry is valid.
fn resource_status(project: &Project, index: &CacheIndex) -> Vec<(String, bool)> {
    project
        .resources()
        .map(|(resource, base, overlays)| {
            let fresh = index.has_valid_entry(&project.ctx, &base, &overlays);
            (resource.base.clone(), fresh)
        })
        .collect()
}

/// Returns the index keys that no configured resource maps to.
fn unreferenced_keys(project: &Project, index: &CacheIndex) -> Vec<PathBuf> {
    let referenced: BTreeSet<PathBuf> = project
        .resources()
        .map(|(_, base, _)| project.ctx.key_for(&base))
        .collect();
    index
        .iter()
        .map(|(key, _)| key)
        .filter(|key| !referenced.contains(*key))
        .cloned()
        .collect()
}
