//! Storage abstraction for the task registry.
//!
//! Callers depend on [`TaskProvider`] only; [`FileProvider`] persists to one
//! JSON file and [`InMemoryProvider`] backs tests and demos.

mod file;
mod memory;

pub use file::{FileProvider, DEFAULT_CACHE_TTL};
pub use memory::{seed_registry, InMemoryProvider, MemoryOptions, OperationRecord};

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ProviderResult;
use crate::fields::*;
use crate::registry::Registry;
use crate::task::{percent_half_up, Task, TaskDraft, TaskPatch};
use crate::validator::{validate, ValidationReport};

/// Which backing store a provider uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    File,
    Memory,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProviderKind::File => "file",
            ProviderKind::Memory => "memory",
        })
    }
}

/// Uniform storage contract.
///
/// Every method that returns successfully after a write guarantees that later
/// reads on the same instance observe that write.
pub trait TaskProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Load the whole registry.
    fn read_registry(&self) -> ProviderResult<Registry>;

    /// All tasks in registry order.
    fn read_all(&self) -> ProviderResult<Vec<Task>> {
        Ok(self.read_registry()?.tasks)
    }

    /// Returns `None` when no task has that id.
    fn read_one(&self, id: &str) -> ProviderResult<Option<Task>> {
        Ok(self.read_registry()?.tasks.into_iter().find(|t| t.id == id))
    }

    fn query(&self, filter: &TaskFilter) -> ProviderResult<Vec<Task>> {
        Ok(self.read_all()?.into_iter().filter(|t| filter.matches(t)).collect())
    }

    /// Insert under the next sequence number of the draft's category.
    ///
    /// # Errors
    ///
    /// [`ProviderError::UnknownCategory`](crate::error::ProviderError::UnknownCategory)
    /// when the registry has no counter for the category.
    fn create(&self, draft: TaskDraft) -> ProviderResult<Task>;

    /// Merge the supplied fields into an existing task.
    ///
    /// # Errors
    ///
    /// [`ProviderError::NotFound`](crate::error::ProviderError::NotFound) when
    /// the id is absent.
    fn update(&self, id: &str, patch: TaskPatch) -> ProviderResult<Task>;

    /// Returns `false` when no task has that id.
    fn delete(&self, id: &str) -> ProviderResult<bool>;

    fn set_status(&self, id: &str, status: Status) -> ProviderResult<Task> {
        self.update(id, TaskPatch::status(status))
    }

    /// Case-insensitive substring search over id, title and description.
    fn search(&self, text: &str) -> ProviderResult<Vec<Task>> {
        Ok(self.read_all()?.into_iter().filter(|t| t.matches_text(text)).collect())
    }

    fn stats(&self) -> ProviderResult<TaskStats> {
        Ok(TaskStats::from_tasks(&self.read_all()?))
    }

    fn validate(&self) -> ProviderResult<ValidationReport> {
        Ok(validate(&self.read_registry()?))
    }

    /// Whether the backing store can currently be read.
    fn health_check(&self) -> bool {
        self.read_registry().is_ok()
    }

    /// Replace the stored registry wholesale (document sync).
    fn replace_all(&self, registry: Registry) -> ProviderResult<()>;

    /// Drop any cached state so the next read goes to the backing store.
    fn invalidate(&self) {}
}

/// Field-by-field predicates; every supplied predicate must hold.
/// Empty sets and `None` mean "not filtered".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskFilter {
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub statuses: Vec<Status>,
    #[serde(default)]
    pub priorities: Vec<Priority>,
    #[serde(default)]
    pub assignees: Vec<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub has_dependencies: Option<bool>,
    #[serde(default)]
    pub is_blocked: Option<bool>,
}

impl TaskFilter {
    pub fn category(category: Category) -> Self {
        TaskFilter {
            categories: vec![category],
            ..Default::default()
        }
    }

    pub fn status(status: Status) -> Self {
        TaskFilter {
            statuses: vec![status],
            ..Default::default()
        }
    }

    pub fn matches(&self, task: &Task) -> bool {
        if !self.categories.is_empty() && !self.categories.contains(&task.category) {
            return false;
        }
        if !self.statuses.is_empty() && !self.statuses.contains(&task.status) {
            return false;
        }
        if !self.priorities.is_empty() && !self.priorities.contains(&task.priority) {
            return false;
        }
        if !self.assignees.is_empty() {
            let Some(assignee) = task.assignee.as_deref() else {
                return false;
            };
            if !self.assignees.iter().any(|a| a.eq_ignore_ascii_case(assignee)) {
                return false;
            }
        }
        if let Some(text) = self.text.as_deref().filter(|t| !t.is_empty()) {
            if !task.matches_text(text) {
                return false;
            }
        }
        if let Some(wanted) = self.has_dependencies {
            if task.dependencies.is_empty() == wanted {
                return false;
            }
        }
        if let Some(wanted) = self.is_blocked {
            if (task.status == Status::Blocked) != wanted {
                return false;
            }
        }
        true
    }
}

/// Aggregate counts over a task list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStats {
    pub total: usize,
    pub by_status: BTreeMap<Status, usize>,
    pub by_category: BTreeMap<Category, usize>,
    pub by_priority: BTreeMap<Priority, usize>,
    pub with_dependencies: usize,
    /// Percentage of tasks that are COMPLETED, rounded half up.
    pub completion_rate: u32,
}

impl TaskStats {
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let mut stats = TaskStats {
            total: tasks.len(),
            ..Default::default()
        };
        for task in tasks {
            *stats.by_status.entry(task.status).or_default() += 1;
            *stats.by_category.entry(task.category).or_default() += 1;
            *stats.by_priority.entry(task.priority).or_default() += 1;
            if !task.dependencies.is_empty() {
                stats.with_dependencies += 1;
            }
        }
        let completed = stats.by_status.get(&Status::Completed).copied().unwrap_or(0);
        stats.completion_rate = percent_half_up(completed as u32, tasks.len() as u32);
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn task(category: Category, seq: u32, status: Status) -> Task {
        let mut t = TaskDraft::new(category, format!("{category} {seq}")).into_task(seq, Utc::now());
        t.status = status;
        t
    }

    fn fixture() -> Vec<Task> {
        vec![
            task(Category::Feat, 1, Status::Pending),
            task(Category::Feat, 2, Status::Blocked),
            task(Category::Bug, 1, Status::Pending),
            task(Category::Bug, 2, Status::Blocked),
        ]
    }

    #[test]
    fn empty_filter_passes_everything() {
        let tasks = fixture();
        assert!(tasks.iter().all(|t| TaskFilter::default().matches(t)));
    }

    #[test]
    fn predicates_are_anded() {
        let filter = TaskFilter {
            categories: vec![Category::Bug],
            statuses: vec![Status::Blocked],
            ..Default::default()
        };
        let hits: Vec<_> = fixture().into_iter().filter(|t| filter.matches(t)).map(|t| t.id).collect();
        assert_eq!(hits, vec!["TASK-BUG-002".to_string()]);
    }

    #[test]
    fn blocked_and_dependency_flags() {
        let mut tasks = fixture();
        tasks[0].dependencies.push("TASK-BUG-001".into());

        let blocked = TaskFilter {
            is_blocked: Some(true),
            ..Default::default()
        };
        assert_eq!(tasks.iter().filter(|t| blocked.matches(t)).count(), 2);

        let independent = TaskFilter {
            has_dependencies: Some(false),
            ..Default::default()
        };
        assert_eq!(tasks.iter().filter(|t| independent.matches(t)).count(), 3);
    }

    #[test]
    fn assignee_filter_excludes_unassigned() {
        let mut tasks = fixture();
        tasks[1].assignee = Some("Dana".into());
        let filter = TaskFilter {
            assignees: vec!["dana".into()],
            ..Default::default()
        };
        let hits: Vec<_> = tasks.iter().filter(|t| filter.matches(t)).collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "TASK-FEAT-002");
    }

    #[test]
    fn stats_completion_rate() {
        let mut tasks = fixture();
        tasks[0].status = Status::Completed;
        tasks[2].status = Status::Completed;
        let stats = TaskStats::from_tasks(&tasks);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.completion_rate, 50);
        assert_eq!(stats.by_category[&Category::Bug], 2);
        assert_eq!(TaskStats::from_tasks(&[]).completion_rate, 0);
    }
}
