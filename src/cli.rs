use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use task_registry::config::{StoreConfig, DEFAULT_REGISTRY_FILE};
use task_registry::logging::DEFAULT_LOG_LEVEL;

use crate::cmd::Commands;

/// Markdown-sourced task registry.
/// Storage defaults to ./task-registry.json or a path passed via --registry.
#[derive(Parser)]
#[command(name = "tasks", version, about = "Build, validate and manage a task registry from Markdown documents")]
pub struct Cli {
    /// Path to the JSON registry file.
    #[arg(long, global = true, env = "TASKS_REGISTRY", default_value = DEFAULT_REGISTRY_FILE)]
    pub registry: PathBuf,

    /// Seconds a registry read stays cached. 0 disables the cache.
    #[arg(long, global = true, env = "TASKS_CACHE_TTL", default_value_t = 5)]
    pub cache_ttl: u64,

    /// Log filter, e.g. `info` or `task_registry=debug`. RUST_LOG wins when set.
    #[arg(long, global = true, env = "TASKS_LOG", default_value = DEFAULT_LOG_LEVEL)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig::new(&self.registry).with_cache_ttl(Duration::from_secs(self.cache_ttl))
    }
}
