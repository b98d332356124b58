//! Configuration types for the split loader
//!
//! This module defines:
//! - Runtime loader configuration with validation
//! - Session properties consulted while building splits

use crate::error::ConfigError;

/// Maximum reasonable loader concurrency
const MAX_CONCURRENCY: usize = 256;

/// Validated loader configuration
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Number of cooperative loader tasks submitted to the executor
    pub loader_concurrency: usize,

    /// Walk into sub-directories of a partition location instead of
    /// skipping them
    pub recursive_dir_walker_enabled: bool,
}

impl LoaderConfig {
    /// Create a validated configuration
    pub fn new(
        loader_concurrency: usize,
        recursive_dir_walker_enabled: bool,
    ) -> Result<Self, ConfigError> {
        if loader_concurrency == 0 || loader_concurrency > MAX_CONCURRENCY {
            return Err(ConfigError::InvalidConcurrency {
                count: loader_concurrency,
                max: MAX_CONCURRENCY,
            });
        }

        Ok(Self {
            loader_concurrency,
            recursive_dir_walker_enabled,
        })
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            loader_concurrency: default_concurrency(),
            recursive_dir_walker_enabled: false,
        }
    }
}

fn default_concurrency() -> usize {
    // Split generation is metadata-bound, one task per core is plenty
    num_cpus::get().clamp(1, MAX_CONCURRENCY)
}

/// Per-query session properties consulted by the loader
#[derive(Debug, Clone, Default)]
pub struct Session {
    force_local_scheduling: bool,
}

impl Session {
    pub fn new(force_local_scheduling: bool) -> Self {
        Self {
            force_local_scheduling,
        }
    }

    /// Whether the query asked for splits to be pinned to hosts that
    /// actually hold the data
    pub fn is_force_local_scheduling(&self) -> bool {
        self.force_local_scheduling
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_config() {
        let config = LoaderConfig::new(4, true).unwrap();
        assert_eq!(config.loader_concurrency, 4);
        assert!(config.recursive_dir_walker_enabled);
    }

    #[test]
    fn zero_concurrency_rejected() {
        assert!(matches!(
            LoaderConfig::new(0, false),
            Err(ConfigError::InvalidConcurrency { count: 0, .. })
        ));
    }

    #[test]
    fn excessive_concurrency_rejected() {
        assert!(LoaderConfig::new(100_000, false).is_err());
    }

    #[test]
    fn default_concurrency_in_bounds() {
        let config = LoaderConfig::default();
        assert!(config.loader_concurrency >= 1);
        assert!(config.loader_concurrency <= MAX_CONCURRENCY);
        assert!(!config.recursive_dir_walker_enabled);
    }
}
