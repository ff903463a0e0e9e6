//! Shared pipeline helpers for CLI commands.
//!
//! Locates the project root, loads `strata.toml`, and derives the cache
//! context and index location every command works with.

use std::path::{Path, PathBuf};

use strata_cache::CacheContext;
use strata_config::{load_config_from_str, ProjectConfig, ResourceSpec, CONFIG_FILE};
use tracing::debug;

use crate::GlobalArgs;

/// A loaded project: its root, configuration and cache locations.
pub struct Project {
    /// Cache context rooted at the project directory.
    pub ctx: CacheContext,
    /// Parsed configuration.
    pub config: ProjectConfig,
    /// Absolute location of the persisted cache index.
    pub index_path: PathBuf,
}

impl Project {
    /// Opens the project selected by the global CLI args.
    pub fn open(global: &GlobalArgs) -> Result<Self, Box<dyn std::error::Error>> {
        let cwd = std::env::current_dir()?;
        let config_file = match global.config {
            Some(ref path) => {
                let p = cwd.join(path);
                if p.is_dir() {
                    p.join(CONFIG_FILE)
                } else {
                    p
                }
            }
            None => find_project_root(&cwd)?.join(CONFIG_FILE),
        };
        let root = config_file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| cwd.clone());

        debug!("using configuration {}", config_file.display());
        let content = std::fs::read_to_string(&config_file)
            .map_err(|e| format!("failed to read {}: {e}", config_file.display()))?;
        let config = load_config_from_str(&content)?;
        Ok(Self::from_config(root, config))
    }

    /// Builds a project from an already parsed configuration.
    pub fn from_config(root: PathBuf, config: ProjectConfig) -> Self {
        let ctx = CacheContext::new(root, &config.cache.dir);
        let index_path = ctx.absolutize(Path::new(&config.cache.index));
        Self {
            ctx,
            config,
            index_path,
        }
    }

    /// Returns each configured resource with its base and overlay paths.
    pub fn resources(&self) -> impl Iterator<Item = (&ResourceSpec, PathBuf, Vec<PathBuf>)> {
        self.config.resources.iter().map(|resource| {
            let base = PathBuf::from(&resource.base);
            let overlays = resource.overlays.iter().map(PathBuf::from).collect();
            (resource, base, overlays)
        })
    }
}

/// Walks up from `start` looking for the nearest directory containing `strata.toml`.
///
/// Returns the directory containing `strata.toml`, or an error if none is found.
pub fn find_project_root(start: &Path) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(CONFIG_FILE).exists() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(format!(
                "could not find {CONFIG_FILE} in {} or any parent directory",
                start.display()
            )
            .into());
        }
    }
}
