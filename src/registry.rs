//! The registry aggregate: tasks, per-category counters and summary metadata.
//!
//! `Registry` is the unit of persistence. Every mutation that store providers
//! perform goes through the methods here so the category counters and the
//! cached metadata counts are updated in the same step as the task list.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ProviderError, ProviderResult};
use crate::fields::*;
use crate::task::{Task, TaskDraft, TaskPatch};

pub const SCHEMA_VERSION: &str = "1.0.0";

/// Numbering state and live count for one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryInfo {
    pub code: Category,
    pub display_name: String,
    pub description: String,
    /// Historical maximum; never lowered by deletes.
    pub highest_assigned_number: u32,
    pub next_available_number: u32,
    #[serde(default)]
    pub task_count: usize,
}

impl CategoryInfo {
    pub fn new(code: Category) -> Self {
        CategoryInfo {
            code,
            display_name: code.display_name().to_string(),
            description: code.description().to_string(),
            highest_assigned_number: 0,
            next_available_number: 1,
            task_count: 0,
        }
    }

    /// Raise the counters to at least `sequence`.
    pub fn observe(&mut self, sequence: u32) {
        if sequence > self.highest_assigned_number {
            self.highest_assigned_number = sequence;
        }
        self.next_available_number = self.highest_assigned_number + 1;
    }
}

/// Summary counts; a cache that can always be recomputed from `tasks`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryMetadata {
    pub schema_version: String,
    pub last_updated: DateTime<Utc>,
    pub total_task_count: usize,
    #[serde(default)]
    pub counts_by_status: BTreeMap<Status, usize>,
    #[serde(default)]
    pub counts_by_category: BTreeMap<Category, usize>,
    #[serde(default)]
    pub last_sync_timestamp: Option<DateTime<Utc>>,
}

/// The full aggregate of tasks, categories and metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registry {
    pub metadata: RegistryMetadata,
    pub categories: BTreeMap<Category, CategoryInfo>,
    pub tasks: Vec<Task>,
}

impl Registry {
    /// A registry with every category initialised and no tasks.
    pub fn empty(now: DateTime<Utc>) -> Self {
        let mut registry = Registry {
            metadata: RegistryMetadata {
                schema_version: SCHEMA_VERSION.to_string(),
                last_updated: now,
                total_task_count: 0,
                counts_by_status: BTreeMap::new(),
                counts_by_category: BTreeMap::new(),
                last_sync_timestamp: None,
            },
            categories: Category::ALL.into_iter().map(|c| (c, CategoryInfo::new(c))).collect(),
            tasks: Vec::new(),
        };
        registry.refresh_metadata(now);
        registry
    }

    /// Aggregate already-numbered tasks, raising category counters to the
    /// highest sequence number seen per category.
    pub fn from_tasks(tasks: Vec<Task>, now: DateTime<Utc>) -> Self {
        let mut registry = Registry::empty(now);
        for task in &tasks {
            registry
                .categories
                .entry(task.category)
                .or_insert_with(|| CategoryInfo::new(task.category))
                .observe(task.sequence_number);
        }
        registry.tasks = tasks;
        registry.refresh_metadata(now);
        registry
    }

    /// Get a task by id.
    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Get a mutable reference to a task by id.
    pub fn get_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    /// Map task ids to their positions in `tasks` (first occurrence wins).
    pub fn index(&self) -> HashMap<&str, usize> {
        let mut m = HashMap::with_capacity(self.tasks.len());
        for (i, t) in self.tasks.iter().enumerate() {
            m.entry(t.id.as_str()).or_insert(i);
        }
        m
    }

    /// Recompute category task counts and the metadata counters.
    pub fn refresh_metadata(&mut self, now: DateTime<Utc>) {
        let mut by_status: BTreeMap<Status, usize> = BTreeMap::new();
        let mut by_category: BTreeMap<Category, usize> = BTreeMap::new();
        for t in &self.tasks {
            *by_status.entry(t.status).or_default() += 1;
            *by_category.entry(t.category).or_default() += 1;
        }
        for (code, info) in self.categories.iter_mut() {
            info.task_count = by_category.get(code).copied().unwrap_or(0);
        }
        self.metadata.total_task_count = self.tasks.len();
        self.metadata.counts_by_status = by_status;
        self.metadata.counts_by_category = by_category;
        self.metadata.last_updated = now;
    }

    /// Insert a new task under the next sequence number of its category.
    ///
    /// The counter bump and the insert are a single step on `self`; callers
    /// that need rollback mutate a copy and swap it in on success.
    pub fn create_task(&mut self, draft: TaskDraft, now: DateTime<Utc>) -> ProviderResult<Task> {
        let info = self
            .categories
            .get_mut(&draft.category)
            .ok_or_else(|| ProviderError::UnknownCategory(draft.category.code().to_string()))?;
        let sequence = info.highest_assigned_number + 1;
        info.observe(sequence);

        let task = draft.into_task(sequence, now);
        self.tasks.push(task.clone());
        self.refresh_metadata(now);
        Ok(task)
    }

    /// Apply a partial update to an existing task.
    pub fn update_task(&mut self, id: &str, patch: TaskPatch, now: DateTime<Utc>) -> ProviderResult<Task> {
        let task = self.get_mut(id).ok_or_else(|| ProviderError::not_found(id))?;
        patch.apply(task, now);
        let updated = task.clone();
        self.refresh_metadata(now);
        Ok(updated)
    }

    /// Remove a task. Returns `false` when no task has that id.
    /// Category high-water marks are left untouched so ids are never reused.
    pub fn remove_task(&mut self, id: &str, now: DateTime<Utc>) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        if self.tasks.len() == before {
            return false;
        }
        self.refresh_metadata(now);
        true
    }

    /// Record a completed document sync.
    pub fn mark_synced(&mut self, now: DateTime<Utc>) {
        self.metadata.last_sync_timestamp = Some(now);
        self.metadata.last_updated = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::format_task_id;

    #[test]
    fn empty_registry_has_every_category() {
        let registry = Registry::empty(Utc::now());
        assert_eq!(registry.categories.len(), Category::ALL.len());
        let feat = &registry.categories[&Category::Feat];
        assert_eq!(feat.highest_assigned_number, 0);
        assert_eq!(feat.next_available_number, 1);
        assert_eq!(registry.metadata.total_task_count, 0);
    }

    #[test]
    fn create_numbers_per_category() {
        let now = Utc::now();
        let mut registry = Registry::empty(now);
        let a = registry.create_task(TaskDraft::new(Category::Feat, "a"), now).unwrap();
        let b = registry.create_task(TaskDraft::new(Category::Bug, "b"), now).unwrap();
        let c = registry.create_task(TaskDraft::new(Category::Feat, "c"), now).unwrap();
        assert_eq!(a.id, "TASK-FEAT-001");
        assert_eq!(b.id, "TASK-BUG-001");
        assert_eq!(c.id, "TASK-FEAT-002");
        let feat = &registry.categories[&Category::Feat];
        assert_eq!((feat.highest_assigned_number, feat.next_available_number, feat.task_count), (2, 3, 2));
        assert_eq!(registry.metadata.counts_by_category[&Category::Feat], 2);
    }

    #[test]
    fn create_rejects_category_missing_from_registry() {
        let now = Utc::now();
        let mut registry = Registry::empty(now);
        registry.categories.remove(&Category::Perf);
        let err = registry.create_task(TaskDraft::new(Category::Perf, "x"), now).unwrap_err();
        assert!(matches!(err, ProviderError::UnknownCategory(ref c) if c == "PERF"));
        assert!(registry.tasks.is_empty());
    }

    #[test]
    fn remove_keeps_high_water_mark() {
        let now = Utc::now();
        let mut registry = Registry::empty(now);
        for title in ["a", "b", "c"] {
            registry.create_task(TaskDraft::new(Category::Feat, title), now).unwrap();
        }
        assert!(registry.remove_task("TASK-FEAT-003", now));
        assert!(!registry.remove_task("TASK-FEAT-003", now));
        let feat = &registry.categories[&Category::Feat];
        assert_eq!(feat.highest_assigned_number, 3);
        assert_eq!(feat.task_count, 2);
        let next = registry.create_task(TaskDraft::new(Category::Feat, "d"), now).unwrap();
        assert_eq!(next.id, format_task_id(Category::Feat, 4));
    }

    #[test]
    fn from_tasks_tracks_highest_sequence() {
        let now = Utc::now();
        let tasks = vec![
            TaskDraft::new(Category::Doc, "x").into_task(7, now),
            TaskDraft::new(Category::Doc, "y").into_task(2, now),
        ];
        let registry = Registry::from_tasks(tasks, now);
        let doc = &registry.categories[&Category::Doc];
        assert_eq!(doc.highest_assigned_number, 7);
        assert_eq!(doc.next_available_number, 8);
        assert_eq!(registry.metadata.total_task_count, 2);
    }

    #[test]
    fn update_unknown_id_is_not_found() {
        let now = Utc::now();
        let mut registry = Registry::empty(now);
        let err = registry.update_task("TASK-FEAT-009", TaskPatch::status(Status::Completed), now).unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
    }

    #[test]
    fn category_map_serialises_keyed_by_code() {
        let registry = Registry::empty(Utc::now());
        let value = serde_json::to_value(&registry).unwrap();
        assert_eq!(value["categories"]["FEAT"]["displayName"], "Feature");
        assert_eq!(value["metadata"]["schemaVersion"], SCHEMA_VERSION);
    }
}
