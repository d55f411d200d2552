//! Task data structure and related functionality.
//!
//! This module defines the core `Task` record, the derived checklist
//! `Progress`, and the input shapes used to create (`TaskDraft`) and partially
//! update (`TaskPatch`) tasks through a store provider.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::fields::*;

/// `TASK-<CODE>-<NNN>` with at least three digits.
static TASK_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^TASK-([A-Z][A-Z0-9]*)-(\d{3,})$").expect("valid task id regex"));

/// Bulleted or numbered checklist item, optionally inside a block quote.
static CHECKLIST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?:>\s*)*(?:[-*+]|\d+[.)])\s+\[([ xX])\]").expect("valid checklist regex")
});

/// One addressable unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub category: Category,
    pub sequence_number: u32,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: Status,
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_effort: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_effort: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub related_tasks: Vec<String>,
    #[serde(default)]
    pub sections: BTreeMap<SectionKey, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<Progress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_document: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<String>,
}

impl Task {
    /// Recompute `progress` from the checklist markers in `sections`.
    pub fn refresh_progress(&mut self) {
        self.progress = Progress::from_sections(&self.sections);
    }

    /// Case-insensitive substring match over id, title and description.
    pub fn matches_text(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.id.to_lowercase().contains(&needle)
            || self.title.to_lowercase().contains(&needle)
            || self.description.to_lowercase().contains(&needle)
    }
}

/// Checklist completion derived from `- [x]` / `- [ ]` markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub completed: u32,
    pub total: u32,
    pub percentage: u32,
}

impl Progress {
    /// Count checklist markers across all section text combined.
    /// Returns `None` when there are no markers at all.
    pub fn from_sections(sections: &BTreeMap<SectionKey, String>) -> Option<Progress> {
        let mut completed = 0u32;
        let mut total = 0u32;
        for text in sections.values() {
            for cap in CHECKLIST_RE.captures_iter(text) {
                total += 1;
                if !cap[1].trim().is_empty() {
                    completed += 1;
                }
            }
        }
        (total > 0).then(|| Progress {
            completed,
            total,
            percentage: percent_half_up(completed, total),
        })
    }
}

/// `100 * part / whole` rounded half up; 0 when `whole` is 0.
pub fn percent_half_up(part: u32, whole: u32) -> u32 {
    if whole == 0 {
        return 0;
    }
    let (part, whole) = (u64::from(part), u64::from(whole));
    ((part * 200 + whole) / (whole * 2)) as u32
}

/// Build the canonical id for a category sequence number.
pub fn format_task_id(category: Category, sequence: u32) -> String {
    format!("TASK-{}-{:03}", category.code(), sequence)
}

/// Split an id into its category code and sequence number.
/// Returns `None` when the id does not match `TASK-<CODE>-<NNN>`.
pub fn parse_task_id(id: &str) -> Option<(&str, u32)> {
    let caps = TASK_ID_RE.captures(id)?;
    let code = caps.get(1)?.as_str();
    let number = caps.get(2)?.as_str().parse().ok()?;
    Some((code, number))
}

/// Whether a string is shaped like a task id.
pub fn is_task_id(id: &str) -> bool {
    TASK_ID_RE.is_match(id)
}

/// Input for creating a task; the store assigns id and sequence number.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    pub category: Category,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_status")]
    pub status: Status,
    #[serde(default = "default_priority")]
    pub priority: Priority,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub estimated_effort: Option<String>,
    #[serde(default)]
    pub actual_effort: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub related_tasks: Vec<String>,
    #[serde(default)]
    pub sections: BTreeMap<SectionKey, String>,
}

fn default_status() -> Status {
    Status::Pending
}

fn default_priority() -> Priority {
    Priority::Medium
}

impl TaskDraft {
    pub fn new(category: Category, title: impl Into<String>) -> Self {
        TaskDraft {
            category,
            title: title.into(),
            description: String::new(),
            status: Status::Pending,
            priority: Priority::Medium,
            assignee: None,
            estimated_effort: None,
            actual_effort: None,
            dependencies: Vec::new(),
            related_tasks: Vec::new(),
            sections: BTreeMap::new(),
        }
    }

    /// Materialise the draft under an assigned sequence number.
    pub fn into_task(self, sequence: u32, now: DateTime<Utc>) -> Task {
        let mut task = Task {
            id: format_task_id(self.category, sequence),
            category: self.category,
            sequence_number: sequence,
            title: self.title,
            description: self.description,
            status: self.status,
            priority: self.priority,
            assignee: self.assignee,
            created_at: now,
            updated_at: now,
            estimated_effort: self.estimated_effort,
            actual_effort: self.actual_effort,
            dependencies: self.dependencies,
            related_tasks: self.related_tasks,
            sections: self.sections,
            progress: None,
            source_document: None,
            source_path: None,
        };
        task.refresh_progress();
        task
    }
}

/// Partial update: only `Some` fields are applied.
///
/// Nested options distinguish "leave alone" (`None`) from "clear"
/// (`Some(None)`) for the optional task fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    pub assignee: Option<Option<String>>,
    pub estimated_effort: Option<Option<String>>,
    pub actual_effort: Option<Option<String>>,
    pub dependencies: Option<Vec<String>>,
    pub related_tasks: Option<Vec<String>>,
    pub sections: Option<BTreeMap<SectionKey, String>>,
}

impl TaskPatch {
    pub fn status(status: Status) -> Self {
        TaskPatch {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.priority.is_none()
            && self.assignee.is_none()
            && self.estimated_effort.is_none()
            && self.actual_effort.is_none()
            && self.dependencies.is_none()
            && self.related_tasks.is_none()
            && self.sections.is_none()
    }

    /// Merge the supplied fields into `task` and stamp `updated_at`.
    pub fn apply(self, task: &mut Task, now: DateTime<Utc>) {
        if let Some(title) = self.title {
            task.title = title;
        }
        if let Some(description) = self.description {
            task.description = description;
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(assignee) = self.assignee {
            task.assignee = assignee;
        }
        if let Some(estimated) = self.estimated_effort {
            task.estimated_effort = estimated;
        }
        if let Some(actual) = self.actual_effort {
            task.actual_effort = actual;
        }
        if let Some(dependencies) = self.dependencies {
            task.dependencies = dependencies;
        }
        if let Some(related) = self.related_tasks {
            task.related_tasks = related;
        }
        if let Some(sections) = self.sections {
            task.sections = sections;
            task.refresh_progress();
        }
        task.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sections(pairs: &[(SectionKey, &str)]) -> BTreeMap<SectionKey, String> {
        pairs.iter().map(|(k, v)| (*k, v.to_string())).collect()
    }

    #[test]
    fn progress_counts_across_sections() {
        let s = sections(&[
            (SectionKey::DefinitionOfDone, "- [x] one\n- [x] two\n- [ ] three"),
            (SectionKey::TestingChecklist, "- [X] four\n- [ ] five\n  - [ ] six\n- [ ] seven"),
        ]);
        let progress = Progress::from_sections(&s).unwrap();
        assert_eq!(progress, Progress { completed: 3, total: 7, percentage: 43 });
    }

    #[test]
    fn numbered_and_quoted_markers_count() {
        let s = sections(&[
            (SectionKey::VerificationSteps, "1. [x] build\n2. [ ] deploy"),
            (SectionKey::AdditionalContext, "> - [x] signed off\n> > 3) [ ] nested quote"),
        ]);
        assert_eq!(
            Progress::from_sections(&s),
            Some(Progress { completed: 2, total: 4, percentage: 50 })
        );
    }

    #[test]
    fn no_markers_means_no_progress() {
        let s = sections(&[(SectionKey::Requirements, "- plain item\n- [link](x)")]);
        assert_eq!(Progress::from_sections(&s), None);
    }

    #[test]
    fn percentage_rounds_half_up() {
        assert_eq!(percent_half_up(1, 8), 13); // 12.5
        assert_eq!(percent_half_up(1, 3), 33);
        assert_eq!(percent_half_up(2, 3), 67);
        assert_eq!(percent_half_up(0, 0), 0);
        assert_eq!(percent_half_up(4, 4), 100);
    }

    #[test]
    fn ids_are_zero_padded_and_parse_back() {
        assert_eq!(format_task_id(Category::Feat, 7), "TASK-FEAT-007");
        assert_eq!(format_task_id(Category::Bug, 1234), "TASK-BUG-1234");
        assert_eq!(parse_task_id("TASK-DOC-042"), Some(("DOC", 42)));
        assert_eq!(parse_task_id("TASK-DOC-42"), None);
        assert_eq!(parse_task_id("task-doc-042"), None);
        assert!(!is_task_id("TASK-FEAT-001 "));
    }

    #[test]
    fn patch_merges_only_supplied_fields() {
        let created = Utc::now();
        let mut task = TaskDraft::new(Category::Feat, "Login").into_task(1, created);
        task.assignee = Some("sam".into());

        let later = created + chrono::Duration::minutes(5);
        TaskPatch {
            priority: Some(Priority::High),
            assignee: Some(None),
            ..Default::default()
        }
        .apply(&mut task, later);

        assert_eq!(task.title, "Login");
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.assignee, None);
        assert_eq!(task.status, Status::Pending);
        assert_eq!(task.updated_at, later);
        assert_eq!(task.created_at, created);
    }

    #[test]
    fn task_serialises_with_camel_case_fields() {
        let task = TaskDraft::new(Category::Bug, "Crash").into_task(3, Utc::now());
        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value["id"], "TASK-BUG-003");
        assert_eq!(value["sequenceNumber"], 3);
        assert_eq!(value["relatedTasks"], serde_json::json!([]));
        assert!(value.get("progress").is_none());
    }
}
