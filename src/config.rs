//! Store configuration.
//!
//! Values come from CLI flags or their environment fallbacks; the library
//! itself never reads the environment.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::repository::TaskRepository;
use crate::store::{FileProvider, DEFAULT_CACHE_TTL};

pub const DEFAULT_REGISTRY_FILE: &str = "task-registry.json";

/// Where the registry lives and how long reads may be cached.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    pub registry_path: PathBuf,
    pub cache_ttl: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            registry_path: PathBuf::from(DEFAULT_REGISTRY_FILE),
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }
}

impl StoreConfig {
    pub fn new(registry_path: impl Into<PathBuf>) -> Self {
        StoreConfig {
            registry_path: registry_path.into(),
            ..Default::default()
        }
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn file_provider(&self) -> FileProvider {
        FileProvider::with_ttl(&self.registry_path, self.cache_ttl)
    }

    pub fn repository(&self) -> TaskRepository {
        TaskRepository::new(Arc::new(self.file_provider()))
    }

    /// `backup/` next to the registry file.
    pub fn backup_dir(&self) -> PathBuf {
        self.registry_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .join("backup")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.registry_path, PathBuf::from("task-registry.json"));
        assert_eq!(config.cache_ttl, Duration::from_secs(5));
        assert_eq!(config.backup_dir(), PathBuf::from("./backup"));
    }

    #[test]
    fn backup_dir_sits_next_to_registry() {
        let config = StoreConfig::new("/data/tasks/registry.json").with_cache_ttl(Duration::ZERO);
        assert_eq!(config.backup_dir(), PathBuf::from("/data/tasks/backup"));
        assert_eq!(config.file_provider().path(), Path::new("/data/tasks/registry.json"));
    }
}
