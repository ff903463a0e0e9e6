//! Configuration types deserialized from `strata.toml`.

use serde::Deserialize;

/// Default cache root, relative to the project root.
pub const DEFAULT_CACHE_DIR: &str = ".strata/cache";

/// Default index location, relative to the project root.
pub const DEFAULT_INDEX_FILE: &str = ".strata/index.json";

/// The top-level project configuration parsed from `strata.toml`.
#[derive(Debug, Default, Deserialize)]
pub struct ProjectConfig {
    /// Where artifacts and the cache index are stored.
    #[serde(default)]
    pub cache: CacheSettings,
    /// Resources to build, in order.
    #[serde(default)]
    pub resources: Vec<ResourceSpec>,
}

/// Cache location settings.
#[derive(Debug, Deserialize)]
pub struct CacheSettings {
    /// Cache root directory, relative to the project root unless absolute.
    #[serde(default = "default_cache_dir")]
    pub dir: String,
    /// Persisted index file, relative to the project root unless absolute.
    #[serde(default = "default_index_file")]
    pub index: String,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
            index: default_index_file(),
        }
    }
}

fn default_cache_dir() -> String {
    DEFAULT_CACHE_DIR.to_string()
}

fn default_index_file() -> String {
    DEFAULT_INDEX_FILE.to_string()
}

/// One merged resource: a base document plus ordered overlays.
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceSpec {
    /// Path to the base document.
    pub base: String,
    /// Overlay paths, applied in the listed order.
    #[serde(default)]
    pub overlays: Vec<String>,
}
