//! JSON file provider.
//!
//! The whole registry lives in one pretty-printed JSON file. Reads go through
//! a short-lived cache; writes reload from disk, mutate, persist atomically via
//! a sibling temp file and rename, then drop the cache.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::sync::Cache;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, info};

use super::{ProviderKind, TaskProvider};
use crate::error::{ProviderError, ProviderResult};
use crate::registry::Registry;
use crate::task::{Task, TaskDraft, TaskPatch};
use crate::validator::{validate, validate_value, ValidationReport};

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5);

/// Provider backed by a single registry file.
pub struct FileProvider {
    path: PathBuf,
    /// `None` when caching is disabled (zero TTL).
    cache: Option<Cache<(), Arc<Registry>>>,
    /// Readers share; a write holds it from reload until the cache is dropped.
    lock: RwLock<()>,
}

impl FileProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_ttl(path, DEFAULT_CACHE_TTL)
    }

    pub fn with_ttl(path: impl Into<PathBuf>, ttl: Duration) -> Self {
        let cache = (!ttl.is_zero()).then(|| Cache::builder().max_capacity(1).time_to_live(ttl).build());
        FileProvider {
            path: path.into(),
            cache,
            lock: RwLock::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read straight from disk. A missing file is a fresh empty registry.
    fn load_from_disk(&self) -> ProviderResult<Registry> {
        match fs::read_to_string(&self.path) {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "registry file missing, starting empty");
                Ok(Registry::empty(Utc::now()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn cached(&self) -> ProviderResult<Arc<Registry>> {
        let _guard = self.lock.read();
        if let Some(hit) = self.cache.as_ref().and_then(|c| c.get(&())) {
            debug!(path = %self.path.display(), "registry cache hit");
            return Ok(hit);
        }
        debug!(path = %self.path.display(), "registry cache miss");
        let registry = Arc::new(self.load_from_disk()?);
        if let Some(cache) = &self.cache {
            cache.insert((), Arc::clone(&registry));
        }
        Ok(registry)
    }

    /// Save the registry using an atomic write (temp file + rename).
    fn persist(&self, registry: &Registry) -> ProviderResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let data = serde_json::to_string_pretty(registry)?;
        if let Err(e) = write_then_rename(&tmp, &self.path, data.as_bytes()) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        info!(path = %self.path.display(), tasks = registry.tasks.len(), "registry persisted");
        Ok(())
    }

    /// Reload, mutate, persist and invalidate as one step under the write lock.
    /// When `apply` fails nothing is written.
    fn write_with<T>(
        &self,
        apply: impl FnOnce(&mut Registry, DateTime<Utc>) -> ProviderResult<T>,
    ) -> ProviderResult<T> {
        let _guard = self.lock.write();
        let mut registry = self.load_from_disk()?;
        let out = apply(&mut registry, Utc::now())?;
        self.persist(&registry)?;
        self.drop_cache();
        Ok(out)
    }

    fn drop_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.invalidate_all();
        }
    }
}

impl TaskProvider for FileProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::File
    }

    fn read_registry(&self) -> ProviderResult<Registry> {
        Ok(Registry::clone(&*self.cached()?))
    }

    fn read_all(&self) -> ProviderResult<Vec<Task>> {
        Ok(self.cached()?.tasks.clone())
    }

    fn read_one(&self, id: &str) -> ProviderResult<Option<Task>> {
        Ok(self.cached()?.get(id).cloned())
    }

    fn create(&self, draft: TaskDraft) -> ProviderResult<Task> {
        let task = self.write_with(|registry, now| registry.create_task(draft, now))?;
        info!(id = %task.id, "task created");
        Ok(task)
    }

    fn update(&self, id: &str, patch: TaskPatch) -> ProviderResult<Task> {
        self.write_with(|registry, now| registry.update_task(id, patch, now))
    }

    fn delete(&self, id: &str) -> ProviderResult<bool> {
        let _guard = self.lock.write();
        let mut registry = self.load_from_disk()?;
        if !registry.remove_task(id, Utc::now()) {
            return Ok(false);
        }
        self.persist(&registry)?;
        self.drop_cache();
        info!(id, "task deleted");
        Ok(true)
    }

    /// A file that no longer deserializes is checked field by field instead
    /// of failing, so hand edits show up as schema errors.
    fn validate(&self) -> ProviderResult<ValidationReport> {
        match self.cached() {
            Ok(registry) => Ok(validate(&registry)),
            Err(ProviderError::Serialization(err)) => {
                debug!(path = %self.path.display(), %err, "registry does not deserialize, validating raw JSON");
                let text = fs::read_to_string(&self.path)?;
                let value = serde_json::from_str(&text).unwrap_or(Value::Null);
                Ok(validate_value(&value, &err.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    fn replace_all(&self, registry: Registry) -> ProviderResult<()> {
        let _guard = self.lock.write();
        self.persist(&registry)?;
        self.drop_cache();
        Ok(())
    }

    /// Healthy when the file parses, or when it is absent but could be created.
    fn health_check(&self) -> bool {
        if self.path.exists() {
            return self.load_from_disk().is_ok();
        }
        match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => parent.is_dir(),
            None => true,
        }
    }

    fn invalidate(&self) {
        self.drop_cache();
    }
}

fn write_then_rename(tmp: &Path, dest: &Path, data: &[u8]) -> io::Result<()> {
    let mut f = File::create(tmp)?;
    f.write_all(data)?;
    f.flush()?;
    f.sync_all()?;
    fs::rename(tmp, dest)
}

impl std::fmt::Debug for FileProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileProvider")
            .field("path", &self.path)
            .field("cached", &self.cache.is_some())
            .finish()
    }
}
