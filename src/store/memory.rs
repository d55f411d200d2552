//! In-memory provider for tests and demos.
//!
//! Supports artificial latency and forced read/write failures, and records
//! every operation it serves so tests can assert on call sequences.

use std::collections::HashMap;
use std::io;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::warn;

use super::{ProviderKind, TaskFilter, TaskProvider, TaskStats};
use crate::error::{ProviderError, ProviderResult};
use crate::fields::*;
use crate::registry::Registry;
use crate::task::{Task, TaskDraft, TaskPatch};
use crate::validator::{validate, ValidationReport};

/// Knobs for exercising callers against slow or failing storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryOptions {
    /// Sleep applied before every operation.
    pub latency: Duration,
    pub fail_reads: bool,
    pub fail_writes: bool,
}

/// One served operation, in call order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationRecord {
    pub operation: String,
    pub timestamp: DateTime<Utc>,
    pub payload: Value,
}

/// The registry plus an id -> position index kept in step with it.
#[derive(Debug)]
struct MemoryState {
    registry: Registry,
    by_id: HashMap<String, usize>,
}

impl MemoryState {
    fn new(registry: Registry) -> Self {
        let by_id = registry.index().into_iter().map(|(id, i)| (id.to_string(), i)).collect();
        MemoryState { registry, by_id }
    }

    fn get(&self, id: &str) -> Option<&Task> {
        self.by_id.get(id).map(|&i| &self.registry.tasks[i])
    }
}

#[derive(Debug)]
pub struct InMemoryProvider {
    state: RwLock<MemoryState>,
    options: RwLock<MemoryOptions>,
    log: Mutex<Vec<OperationRecord>>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::with_options(MemoryOptions::default())
    }

    pub fn with_options(options: MemoryOptions) -> Self {
        InMemoryProvider {
            state: RwLock::new(MemoryState::new(Registry::empty(Utc::now()))),
            options: RwLock::new(options),
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn from_registry(registry: Registry) -> Self {
        let provider = Self::new();
        *provider.state.write() = MemoryState::new(registry);
        provider
    }

    /// A provider pre-filled with [`seed_registry`].
    pub fn seeded() -> Self {
        let provider = Self::new();
        provider.seed();
        provider
    }

    /// Replace the contents with the fixed illustrative dataset.
    pub fn seed(&self) {
        let registry = seed_registry(Utc::now());
        self.record("seed", json!({ "tasks": registry.tasks.len() }));
        *self.state.write() = MemoryState::new(registry);
    }

    pub fn set_options(&self, options: MemoryOptions) {
        *self.options.write() = options;
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.options.write().fail_reads = fail;
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.options.write().fail_writes = fail;
    }

    /// Operations served so far, oldest first.
    pub fn operations(&self) -> Vec<OperationRecord> {
        self.log.lock().clone()
    }

    pub fn clear_operations(&self) {
        self.log.lock().clear();
    }

    fn record(&self, operation: &str, payload: Value) {
        self.log.lock().push(OperationRecord {
            operation: operation.to_string(),
            timestamp: Utc::now(),
            payload,
        });
    }

    /// Apply latency, log the call and fail it if reads are disabled.
    fn begin_read(&self, operation: &str, payload: Value) -> ProviderResult<()> {
        let options = self.options.read().clone();
        if !options.latency.is_zero() {
            thread::sleep(options.latency);
        }
        self.record(operation, payload);
        if options.fail_reads {
            warn!(operation, "simulated read failure");
            return Err(io::Error::other(format!("simulated read failure in {operation}")).into());
        }
        Ok(())
    }

    fn begin_write(&self, operation: &str, payload: Value) -> ProviderResult<()> {
        let options = self.options.read().clone();
        if !options.latency.is_zero() {
            thread::sleep(options.latency);
        }
        self.record(operation, payload);
        if options.fail_writes {
            warn!(operation, "simulated write failure");
            return Err(io::Error::other(format!("simulated write failure in {operation}")).into());
        }
        Ok(())
    }

    fn with_registry<T>(&self, f: impl FnOnce(&Registry) -> T) -> T {
        f(&self.state.read().registry)
    }

    fn contains(&self, id: &str) -> bool {
        self.state.read().by_id.contains_key(id)
    }

    /// Mutate a copy and swap it in only when `f` succeeds.
    fn mutate<T>(&self, f: impl FnOnce(&mut Registry, DateTime<Utc>) -> ProviderResult<T>) -> ProviderResult<T> {
        let mut guard = self.state.write();
        let mut next = guard.registry.clone();
        let out = f(&mut next, Utc::now())?;
        *guard = MemoryState::new(next);
        Ok(out)
    }
}

impl Default for InMemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskProvider for InMemoryProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Memory
    }

    fn read_registry(&self) -> ProviderResult<Registry> {
        self.begin_read("readRegistry", Value::Null)?;
        Ok(self.with_registry(Registry::clone))
    }

    fn read_all(&self) -> ProviderResult<Vec<Task>> {
        self.begin_read("readAll", Value::Null)?;
        Ok(self.with_registry(|r| r.tasks.clone()))
    }

    fn read_one(&self, id: &str) -> ProviderResult<Option<Task>> {
        self.begin_read("readOne", json!({ "id": id }))?;
        Ok(self.state.read().get(id).cloned())
    }

    fn query(&self, filter: &TaskFilter) -> ProviderResult<Vec<Task>> {
        self.begin_read("query", serde_json::to_value(filter)?)?;
        Ok(self.with_registry(|r| r.tasks.iter().filter(|t| filter.matches(t)).cloned().collect()))
    }

    fn create(&self, draft: TaskDraft) -> ProviderResult<Task> {
        self.begin_write("create", serde_json::to_value(&draft)?)?;
        self.mutate(|registry, now| registry.create_task(draft, now))
    }

    fn update(&self, id: &str, patch: TaskPatch) -> ProviderResult<Task> {
        self.begin_write("update", json!({ "id": id, "patch": serde_json::to_value(&patch)? }))?;
        if !self.contains(id) {
            return Err(ProviderError::not_found(id));
        }
        self.mutate(|registry, now| registry.update_task(id, patch, now))
    }

    fn delete(&self, id: &str) -> ProviderResult<bool> {
        self.begin_write("delete", json!({ "id": id }))?;
        if !self.contains(id) {
            return Ok(false);
        }
        self.mutate(|registry, now| Ok(registry.remove_task(id, now)))
    }

    fn set_status(&self, id: &str, status: Status) -> ProviderResult<Task> {
        self.begin_write("setStatus", json!({ "id": id, "status": status }))?;
        if !self.contains(id) {
            return Err(ProviderError::not_found(id));
        }
        self.mutate(|registry, now| registry.update_task(id, TaskPatch::status(status), now))
    }

    fn search(&self, text: &str) -> ProviderResult<Vec<Task>> {
        self.begin_read("search", json!({ "text": text }))?;
        Ok(self.with_registry(|r| r.tasks.iter().filter(|t| t.matches_text(text)).cloned().collect()))
    }

    fn stats(&self) -> ProviderResult<TaskStats> {
        self.begin_read("stats", Value::Null)?;
        Ok(self.with_registry(|r| TaskStats::from_tasks(&r.tasks)))
    }

    fn validate(&self) -> ProviderResult<ValidationReport> {
        self.begin_read("validate", Value::Null)?;
        Ok(self.with_registry(validate))
    }

    fn health_check(&self) -> bool {
        !self.options.read().fail_reads
    }

    fn replace_all(&self, registry: Registry) -> ProviderResult<()> {
        self.begin_write("replaceAll", json!({ "tasks": registry.tasks.len() }))?;
        *self.state.write() = MemoryState::new(registry);
        Ok(())
    }
}

/// Fixed demo dataset: a small authentication project spread over several
/// categories, with dependencies, one blocked task and checklist progress.
pub fn seed_registry(now: DateTime<Utc>) -> Registry {
    let mut registry = Registry::empty(now);
    let entries: [(Category, &str, Status, Priority, Option<&str>, &[&str], &str); 6] = [
        (
            Category::Feat,
            "User authentication",
            Status::Completed,
            Priority::High,
            Some("alice"),
            &[],
            "- [x] Login form\n- [x] Session tokens",
        ),
        (
            Category::Feat,
            "Password reset flow",
            Status::InProgress,
            Priority::High,
            Some("bob"),
            &["TASK-FEAT-001"],
            "- [x] Reset email\n- [ ] Token expiry",
        ),
        (
            Category::Feat,
            "Two-factor authentication",
            Status::Pending,
            Priority::Medium,
            None,
            &["TASK-FEAT-001", "TASK-SEC-001"],
            "",
        ),
        (
            Category::Bug,
            "Session expires too early",
            Status::Blocked,
            Priority::Critical,
            Some("alice"),
            &["TASK-FEAT-001"],
            "",
        ),
        (
            Category::Doc,
            "Authentication guide",
            Status::Pending,
            Priority::Low,
            None,
            &["TASK-FEAT-002"],
            "",
        ),
        (
            Category::Sec,
            "Audit token storage",
            Status::Pending,
            Priority::High,
            Some("carol"),
            &[],
            "",
        ),
    ];

    for (category, title, status, priority, assignee, deps, checklist) in entries {
        let mut draft = TaskDraft::new(category, title);
        draft.status = status;
        draft.priority = priority;
        draft.assignee = assignee.map(str::to_string);
        draft.dependencies = deps.iter().map(|d| d.to_string()).collect();
        if !checklist.is_empty() {
            draft.sections.insert(SectionKey::DefinitionOfDone, checklist.to_string());
        }
        // Every seeded category is present in a fresh registry.
        if let Err(err) = registry.create_task(draft, now) {
            warn!(%err, "seed task skipped");
        }
    }
    registry
}
