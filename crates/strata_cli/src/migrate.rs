//! `strata migrate` — upgrade an index that stores absolute keys.

use strata_cache::CacheIndex;

use crate::pipeline::Project;
use crate::GlobalArgs;

/// Runs the `strata migrate` command.
///
/// Unlike `build`, a corrupt index is an error here rather than a reason to
/// start over, and nothing is garbage-collected.
pub fn run(global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project = Project::open(global)?;
    let relocated = migrate(&project)?;
    if !global.quiet {
        eprintln!("   Relocated {relocated} entr{}", if relocated == 1 { "y" } else { "ies" });
    }
    Ok(0)
}

fn migrate(project: &Project) -> Result<usize, Box<dyn std::error::Error>> {
    let mut index = CacheIndex::load(&project.index_path)?;
    let relocated = index.relocate_absolute_keys_to_relative(&project.ctx);
    if relocated > 0 {
        index.save(&project.index_path)?;
    }
    Ok(relocated)
}
