//! Named convenience queries and transitions over a [`TaskProvider`].
//!
//! The repository keeps no state of its own; every method is one provider call
//! or a short fixed sequence of them.

use std::sync::Arc;

use crate::error::ProviderResult;
use crate::fields::*;
use crate::store::{TaskFilter, TaskProvider};
use crate::task::{Task, TaskDraft};

#[derive(Clone)]
pub struct TaskRepository {
    provider: Arc<dyn TaskProvider>,
}

impl TaskRepository {
    pub fn new(provider: Arc<dyn TaskProvider>) -> Self {
        TaskRepository { provider }
    }

    pub fn provider(&self) -> &dyn TaskProvider {
        self.provider.as_ref()
    }

    pub fn find_all(&self) -> ProviderResult<Vec<Task>> {
        self.provider.read_all()
    }

    pub fn find_by_id(&self, id: &str) -> ProviderResult<Option<Task>> {
        self.provider.read_one(id)
    }

    pub fn find_by_category(&self, category: Category) -> ProviderResult<Vec<Task>> {
        self.provider.query(&TaskFilter::category(category))
    }

    pub fn find_by_status(&self, status: Status) -> ProviderResult<Vec<Task>> {
        self.provider.query(&TaskFilter::status(status))
    }

    pub fn find_blocked(&self) -> ProviderResult<Vec<Task>> {
        self.provider.query(&TaskFilter {
            is_blocked: Some(true),
            ..Default::default()
        })
    }

    /// Tasks that list `id` among their dependencies.
    pub fn find_dependents(&self, id: &str) -> ProviderResult<Vec<Task>> {
        Ok(self
            .provider
            .read_all()?
            .into_iter()
            .filter(|t| t.dependencies.iter().any(|d| d == id))
            .collect())
    }

    /// Resolve a task's dependencies, skipping ids that no longer exist.
    /// Returns an empty list when `id` itself is unknown.
    pub fn get_dependencies(&self, id: &str) -> ProviderResult<Vec<Task>> {
        let tasks = self.provider.read_all()?;
        let Some(task) = tasks.iter().find(|t| t.id == id) else {
            return Ok(Vec::new());
        };
        Ok(task
            .dependencies
            .iter()
            .filter_map(|dep| tasks.iter().find(|t| &t.id == dep).cloned())
            .collect())
    }

    pub fn start(&self, id: &str) -> ProviderResult<Task> {
        self.provider.set_status(id, Status::InProgress)
    }

    pub fn complete(&self, id: &str) -> ProviderResult<Task> {
        self.provider.set_status(id, Status::Completed)
    }

    pub fn block(&self, id: &str) -> ProviderResult<Task> {
        self.provider.set_status(id, Status::Blocked)
    }

    pub fn cancel(&self, id: &str) -> ProviderResult<Task> {
        self.provider.set_status(id, Status::Cancelled)
    }

    pub fn create(&self, draft: TaskDraft) -> ProviderResult<Task> {
        self.provider.create(draft)
    }

    /// Percentage of tasks that are COMPLETED.
    pub fn completion_rate(&self) -> ProviderResult<u32> {
        Ok(self.provider.stats()?.completion_rate)
    }

    /// Drop provider caches so the next call sees the backing store.
    pub fn refresh(&self) {
        self.provider.invalidate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::store::InMemoryProvider;

    fn seeded() -> (Arc<InMemoryProvider>, TaskRepository) {
        let provider = Arc::new(InMemoryProvider::seeded());
        let repo = TaskRepository::new(provider.clone());
        (provider, repo)
    }

    fn ids(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn dependents_are_found_by_linear_scan() {
        let (_, repo) = seeded();
        let dependents = repo.find_dependents("TASK-FEAT-001").unwrap();
        assert_eq!(ids(&dependents), vec!["TASK-FEAT-002", "TASK-FEAT-003", "TASK-BUG-001"]);
        assert!(repo.find_dependents("TASK-DOC-001").unwrap().is_empty());
    }

    #[test]
    fn dependencies_skip_missing_ids() {
        let (provider, repo) = seeded();
        provider
            .update(
                "TASK-DOC-001",
                crate::task::TaskPatch {
                    dependencies: Some(vec!["TASK-FEAT-002".into(), "TASK-FEAT-404".into()]),
                    ..Default::default()
                },
            )
            .unwrap();
        let deps = repo.get_dependencies("TASK-DOC-001").unwrap();
        assert_eq!(ids(&deps), vec!["TASK-FEAT-002"]);
        assert!(repo.get_dependencies("TASK-NOPE-001").unwrap().is_empty());
    }

    #[test]
    fn transitions_delegate_to_set_status() {
        let (provider, repo) = seeded();
        provider.clear_operations();

        assert_eq!(repo.start("TASK-DOC-001").unwrap().status, Status::InProgress);
        assert_eq!(repo.block("TASK-DOC-001").unwrap().status, Status::Blocked);
        assert_eq!(repo.complete("TASK-DOC-001").unwrap().status, Status::Completed);
        assert_eq!(repo.cancel("TASK-SEC-001").unwrap().status, Status::Cancelled);

        let ops: Vec<_> = provider.operations().into_iter().map(|o| o.operation).collect();
        assert_eq!(ops, vec!["setStatus"; 4]);
    }

    #[test]
    fn transition_on_missing_task_is_not_found() {
        let (_, repo) = seeded();
        let err = repo.complete("TASK-FEAT-999").unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
    }

    #[test]
    fn completion_rate_half_of_four() {
        let provider = Arc::new(InMemoryProvider::new());
        let repo = TaskRepository::new(provider);
        for title in ["a", "b", "c", "d"] {
            repo.create(TaskDraft::new(Category::Feat, title)).unwrap();
        }
        repo.complete("TASK-FEAT-001").unwrap();
        repo.complete("TASK-FEAT-003").unwrap();
        assert_eq!(repo.completion_rate().unwrap(), 50);
    }

    #[test]
    fn blocked_and_category_queries() {
        let (_, repo) = seeded();
        assert_eq!(ids(&repo.find_blocked().unwrap()), vec!["TASK-BUG-001"]);
        assert_eq!(repo.find_by_category(Category::Feat).unwrap().len(), 3);
        assert_eq!(repo.find_by_status(Status::Pending).unwrap().len(), 3);
    }
}
