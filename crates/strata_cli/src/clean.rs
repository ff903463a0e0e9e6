//! `strata clean` — remove every cached artifact.

use strata_cache::{CacheIndex, FlushReport};

use crate::pipeline::Project;
use crate::GlobalArgs;

/// Runs the `strata clean` command.
///
/// Flushes the index without looking anything up, so every entry counts as
/// unused and is collected. The saved index is empty afterwards.
pub fn run(global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project = Project::open(global)?;
    let report = clean(&project)?;
    if !global.quiet {
        eprintln!("   Removed {} artifact(s)", report.removed);
    }
    Ok(if report.errors == 0 { 0 } else { 1 })
}

fn clean(project: &Project) -> Result<FlushReport, Box<dyn std::error::Error>> {
    let mut index = CacheIndex::load_or_default(&project.index_path);
    Ok(index.flush(&project.ctx, &project.index_path)?)
}
