//! `strata build` — merge every configured resource.
//!
//! 1. Load the project and the persisted cache index
//! 2. Look up or build each resource's artifact, in configuration order
//! 3. Flush: drop artifacts no resource asked for and save the index

use strata_cache::{CacheIndex, FlushReport};

use crate::pipeline::Project;
use crate::GlobalArgs;

/// Runs the `strata build` command.
///
/// Prints every artifact path to stdout. Returns exit code 0 if every
/// resource was built, 1 otherwise.
pub fn run(global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project = Project::open(global)?;
    let (failures, report) = build_all(&project, global.quiet)?;

    if !global.quiet {
        eprintln!(
            "   Result: {} artifact(s), {} removed, {} failed",
            report.kept, report.removed, failures
        );
    }
    Ok(if failures == 0 { 0 } else { 1 })
}

/// Builds every resource and flushes the index. Returns the number of
/// resources that could not be built along with the flush report.
fn build_all(
    project: &Project,
    quiet: bool,
) -> Result<(usize, FlushReport), Box<dyn std::error::Error>> {
    let ctx = &project.ctx;
    let mut index = CacheIndex::load_or_default(&project.index_path);
    let mut failures = 0;

    for (resource, base, overlays) in project.resources() {
        let fresh = index.has_valid_entry(ctx, &base, &overlays);
        match index.get_or_create_artifact(ctx, &base, &overlays) {
            Some(artifact) => {
                if !quiet {
                    let status = if fresh { "Fresh" } else { "Merged" };
                    eprintln!("{status:>8} {}", resource.base);
                }
                println!("{}", artifact.display());
            }
            None => {
                eprintln!("error: failed to build {}", resource.base);
                failures += 1;
            }
        }
    }

    let report = index.flush(ctx, &project.index_path)?;
    Ok((failures, report))
}
