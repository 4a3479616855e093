//! Engine configuration

use std::path::PathBuf;

/// Default number of parsed expressions kept in the cache
pub const DEFAULT_EXPRESSION_CACHE_SIZE: usize = 256;

/// Where records are kept
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StoreConfig {
    /// Process-local concurrent map
    #[default]
    Memory,
    /// One JSON file per record under this directory
    Directory(PathBuf),
}

/// Configuration for [`CarePlanEngine`](crate::CarePlanEngine)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Store backend
    pub store: StoreConfig,

    /// Maximum number of parsed expressions to cache; 0 disables the cache
    pub expression_cache_size: usize,

    /// Whether a member missing from a resource is an evaluation error
    /// (otherwise it yields empty)
    pub strict_paths: bool,
}

impl EngineConfig {
    /// In-memory store with default evaluator settings
    pub fn in_memory() -> Self {
        Self {
            store: StoreConfig::Memory,
            expression_cache_size: DEFAULT_EXPRESSION_CACHE_SIZE,
            strict_paths: true,
        }
    }

    /// File-backed store rooted at `data_dir`
    pub fn persistent(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            store: StoreConfig::Directory(data_dir.into()),
            ..Self::in_memory()
        }
    }

    /// Override the expression cache size
    pub fn with_expression_cache_size(mut self, size: usize) -> Self {
        self.expression_cache_size = size;
        self
    }

    /// Choose strict or lenient member navigation
    pub fn with_strict_paths(mut self, strict: bool) -> Self {
        self.strict_paths = strict;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let config = EngineConfig::default();
        assert_eq!(config.store, StoreConfig::Memory);
        assert!(config.strict_paths);

        let config = EngineConfig::persistent("/tmp/careplan")
            .with_expression_cache_size(0)
            .with_strict_paths(false);
        assert_eq!(config.store, StoreConfig::Directory(PathBuf::from("/tmp/careplan")));
        assert_eq!(config.expression_cache_size, 0);
        assert!(!config.strict_paths);
    }
}
