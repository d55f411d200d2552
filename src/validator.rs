//! Registry validation.
//!
//! `validate` never fails; it returns a [`ValidationReport`] whose errors are
//! structural problems (schema violations, duplicate ids, dependency cycles)
//! and whose warnings are drift that the next rebuild heals (dangling
//! references, stale counters, stale metadata counts).

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::fields::*;
use crate::registry::Registry;
use crate::task::{is_task_id, parse_task_id, Progress, Task};

/// What a validation finding is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueKind {
    Schema,
    DuplicateId,
    DanglingReference,
    DependencyCycle,
    CounterDrift,
    MetadataDrift,
}

/// A single validation finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub kind: IssueKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
}

impl ValidationIssue {
    fn new(kind: IssueKind, message: impl Into<String>) -> Self {
        ValidationIssue {
            kind,
            task_id: None,
            field: None,
            message: message.into(),
        }
    }

    fn task(mut self, id: &str) -> Self {
        self.task_id = Some(id.to_string());
        self
    }

    fn field(mut self, field: &str) -> Self {
        self.field = Some(field.to_string());
        self
    }
}

/// Outcome of validating a registry. Valid means zero errors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
    fn finish(mut self) -> Self {
        self.is_valid = self.errors.is_empty();
        self
    }
}

/// Run every check against `registry`, in a fixed order.
pub fn validate(registry: &Registry) -> ValidationReport {
    let mut report = ValidationReport::default();
    check_schema(registry, &mut report);
    check_duplicates(registry, &mut report);
    check_references(registry, &mut report);
    check_cycles(registry, &mut report);
    check_counters(registry, &mut report);
    check_metadata(registry, &mut report);
    report.finish()
}

/// Schema check for a registry file that no longer deserializes.
///
/// Each entry of `tasks` is checked field by field so a hand edit such as an
/// unknown status names the task and field. Entries that do deserialize then
/// go through the structural checks. `load_error` is reported on its own only
/// when nothing more specific was found.
pub fn validate_value(value: &Value, load_error: &str) -> ValidationReport {
    let mut report = ValidationReport::default();
    let Some(entries) = value.get("tasks").and_then(Value::as_array) else {
        report.errors.push(
            ValidationIssue::new(IssueKind::Schema, format!("registry has no tasks array ({load_error})"))
                .field("tasks"),
        );
        return report.finish();
    };

    let tasks: Vec<Task> = entries
        .iter()
        .enumerate()
        .filter_map(|(position, entry)| check_task_value(position, entry, &mut report))
        .collect();
    let partial = Registry { tasks, ..Registry::empty(Utc::now()) };
    check_schema(&partial, &mut report);
    check_duplicates(&partial, &mut report);
    check_cycles(&partial, &mut report);

    if report.errors.is_empty() {
        report.errors.push(ValidationIssue::new(
            IssueKind::Schema,
            format!("registry file does not match the schema: {load_error}"),
        ));
    }
    report.finish()
}

const REQUIRED_FIELDS: [&str; 8] = [
    "id",
    "category",
    "sequenceNumber",
    "title",
    "status",
    "priority",
    "createdAt",
    "updatedAt",
];

/// Returns the task when the entry is well formed.
fn check_task_value(position: usize, entry: &Value, report: &mut ValidationReport) -> Option<Task> {
    let label = match entry.get("id").and_then(Value::as_str) {
        Some(id) => id.to_string(),
        None => format!("tasks[{position}]"),
    };
    let schema = |field: &str, message: String| {
        ValidationIssue::new(IssueKind::Schema, message).task(&label).field(field)
    };
    if !entry.is_object() {
        report.errors.push(schema("tasks", format!("{label} is not an object")));
        return None;
    }

    let before = report.errors.len();
    for field in REQUIRED_FIELDS {
        match entry.get(field).filter(|v| !v.is_null()) {
            None => report.errors.push(schema(field, format!("missing required field {field}"))),
            Some(v) if !field_accepts(field, v) => {
                report.errors.push(schema(field, format!("{field} is {v}, expected {}", expected(field))))
            }
            Some(_) => {}
        }
    }
    if let Some(id) = entry.get("id").and_then(Value::as_str).filter(|id| !is_task_id(id)) {
        report.errors.push(schema("id", format!("id '{id}' does not match TASK-<CODE>-<NNN>")));
    }
    for field in ["dependencies", "relatedTasks"] {
        if let Some(v) = entry.get(field).filter(|v| !v.is_null() && !accepts::<Vec<String>>(v)) {
            report.errors.push(schema(field, format!("{field} is {v}, expected a list of task ids")));
        }
    }
    if report.errors.len() > before {
        return None;
    }

    match serde_json::from_value(entry.clone()) {
        Ok(task) => Some(task),
        Err(err) => {
            report.errors.push(
                ValidationIssue::new(IssueKind::Schema, format!("{label} does not match the task schema: {err}"))
                    .task(&label),
            );
            None
        }
    }
}

fn accepts<T: DeserializeOwned>(value: &Value) -> bool {
    serde_json::from_value::<T>(value.clone()).is_ok()
}

fn field_accepts(field: &str, value: &Value) -> bool {
    match field {
        "category" => accepts::<Category>(value),
        "sequenceNumber" => accepts::<u32>(value),
        "status" => accepts::<Status>(value),
        "priority" => accepts::<Priority>(value),
        "createdAt" | "updatedAt" => accepts::<DateTime<Utc>>(value),
        _ => accepts::<String>(value),
    }
}

fn expected(field: &str) -> String {
    let one_of = |names: Vec<&str>| format!("one of {}", names.join(", "));
    match field {
        "category" => one_of(Category::ALL.iter().map(|c| c.code()).collect()),
        "sequenceNumber" => "a positive integer".to_string(),
        "status" => one_of(Status::ALL.iter().map(|s| s.as_str()).collect()),
        "priority" => one_of(Priority::ALL.iter().map(|p| p.as_str()).collect()),
        "createdAt" | "updatedAt" => "an RFC 3339 timestamp".to_string(),
        _ => "a string".to_string(),
    }
}

fn check_schema(registry: &Registry, report: &mut ValidationReport) {
    for task in &registry.tasks {
        check_task_schema(task, report);
    }
}

fn check_task_schema(task: &Task, report: &mut ValidationReport) {
    let schema = |field: &str, message: String| {
        ValidationIssue::new(IssueKind::Schema, message).task(&task.id).field(field)
    };

    match parse_task_id(&task.id) {
        None => report.errors.push(schema(
            "id",
            format!("id '{}' does not match TASK-<CODE>-<NNN>", task.id),
        )),
        Some((code, number)) => {
            if code != task.category.code() {
                report.errors.push(schema(
                    "category",
                    format!("id code {code} does not match category {}", task.category),
                ));
            }
            if number != task.sequence_number {
                report.errors.push(schema(
                    "sequenceNumber",
                    format!("id suffix {number} does not match sequence number {}", task.sequence_number),
                ));
            }
        }
    }
    if task.sequence_number == 0 {
        report.errors.push(schema("sequenceNumber", "sequence number must be positive".to_string()));
    }
    if task.title.trim().is_empty() {
        report.errors.push(schema("title", "title is empty".to_string()));
    }
    for (field, refs) in [("dependencies", &task.dependencies), ("relatedTasks", &task.related_tasks)] {
        for reference in refs.iter().filter(|r| !is_task_id(r)) {
            report.errors.push(schema(field, format!("reference '{reference}' is not a task id")));
        }
    }
    if task.progress != Progress::from_sections(&task.sections) {
        report.errors.push(schema(
            "progress",
            "progress does not match the checklist markers in sections".to_string(),
        ));
    }
    if task.updated_at < task.created_at {
        report.warnings.push(schema("updatedAt", "updatedAt is earlier than createdAt".to_string()));
    }
}

/// One error per occurrence after the first.
fn check_duplicates(registry: &Registry, report: &mut ValidationReport) {
    let mut seen: HashSet<&str> = HashSet::new();
    for task in &registry.tasks {
        if !seen.insert(task.id.as_str()) {
            report.errors.push(
                ValidationIssue::new(IssueKind::DuplicateId, format!("duplicate task id {}", task.id))
                    .task(&task.id)
                    .field("id"),
            );
        }
    }
}

fn check_references(registry: &Registry, report: &mut ValidationReport) {
    let index = registry.index();
    for task in &registry.tasks {
        for (field, refs) in [("dependencies", &task.dependencies), ("relatedTasks", &task.related_tasks)] {
            for reference in refs {
                if is_task_id(reference) && !index.contains_key(reference.as_str()) {
                    report.warnings.push(
                        ValidationIssue::new(
                            IssueKind::DanglingReference,
                            format!("{} references missing task {reference}", task.id),
                        )
                        .task(&task.id)
                        .field(field),
                    );
                }
            }
        }
    }
}

/// Every task starts its own depth-first walk with a fresh path, so a cycle
/// reachable from several starting points is still found from each. Cycles
/// are reported once, keyed by their smallest rotation.
fn check_cycles(registry: &Registry, report: &mut ValidationReport) {
    let index = registry.index();
    let mut reported: HashSet<Vec<&str>> = HashSet::new();

    for task in &registry.tasks {
        let mut path: Vec<&str> = Vec::new();
        let mut cycles: Vec<Vec<&str>> = Vec::new();
        let mut done: HashSet<&str> = HashSet::new();
        walk(registry, &index, task.id.as_str(), &mut path, &mut done, &mut cycles);

        for cycle in cycles {
            let key = canonical_rotation(&cycle);
            if reported.contains(&key) {
                continue;
            }
            let mut rendered = key.clone();
            rendered.push(key[0]);
            report.errors.push(
                ValidationIssue::new(
                    IssueKind::DependencyCycle,
                    format!("dependency cycle: {}", rendered.join(" -> ")),
                )
                .task(key[0])
                .field("dependencies"),
            );
            reported.insert(key);
        }
    }
}

fn walk<'r>(
    registry: &'r Registry,
    index: &HashMap<&str, usize>,
    id: &'r str,
    path: &mut Vec<&'r str>,
    done: &mut HashSet<&'r str>,
    cycles: &mut Vec<Vec<&'r str>>,
) {
    if let Some(pos) = path.iter().position(|p| *p == id) {
        cycles.push(path[pos..].to_vec());
        return;
    }
    // `done` is local to one starting task; it stops re-walking a subtree
    // already fully explored from this start.
    if done.contains(id) {
        return;
    }
    let Some(&i) = index.get(id) else {
        return;
    };
    path.push(id);
    for dep in &registry.tasks[i].dependencies {
        walk(registry, index, dep.as_str(), path, done, cycles);
    }
    path.pop();
    done.insert(id);
}

fn canonical_rotation<'a>(cycle: &[&'a str]) -> Vec<&'a str> {
    let start = cycle
        .iter()
        .enumerate()
        .min_by_key(|(_, id)| **id)
        .map(|(i, _)| i)
        .unwrap_or(0);
    cycle[start..].iter().chain(cycle[..start].iter()).copied().collect()
}

fn check_counters(registry: &Registry, report: &mut ValidationReport) {
    let mut highest: BTreeMap<Category, u32> = BTreeMap::new();
    for task in &registry.tasks {
        let entry = highest.entry(task.category).or_default();
        *entry = (*entry).max(task.sequence_number);
    }

    for (code, info) in &registry.categories {
        let observed = highest.get(code).copied().unwrap_or(0);
        if observed != info.highest_assigned_number {
            report.warnings.push(ValidationIssue::new(
                IssueKind::CounterDrift,
                format!(
                    "category {code}: highest sequence in use is {observed}, counter says {}",
                    info.highest_assigned_number
                ),
            ));
        }
        if info.next_available_number != info.highest_assigned_number + 1 {
            report.warnings.push(ValidationIssue::new(
                IssueKind::CounterDrift,
                format!(
                    "category {code}: next available number {} should be {}",
                    info.next_available_number,
                    info.highest_assigned_number + 1
                ),
            ));
        }
    }

    for code in highest.keys().filter(|c| !registry.categories.contains_key(c)) {
        report.warnings.push(ValidationIssue::new(
            IssueKind::CounterDrift,
            format!("category {code} has tasks but no counter entry"),
        ));
    }
}

fn check_metadata(registry: &Registry, report: &mut ValidationReport) {
    let meta = &registry.metadata;
    if meta.total_task_count != registry.tasks.len() {
        report.warnings.push(
            ValidationIssue::new(
                IssueKind::MetadataDrift,
                format!(
                    "totalTaskCount is {} but the registry holds {} tasks",
                    meta.total_task_count,
                    registry.tasks.len()
                ),
            )
            .field("totalTaskCount"),
        );
    }

    let mut by_status: BTreeMap<Status, usize> = BTreeMap::new();
    let mut by_category: BTreeMap<Category, usize> = BTreeMap::new();
    for task in &registry.tasks {
        *by_status.entry(task.status).or_default() += 1;
        *by_category.entry(task.category).or_default() += 1;
    }
    if meta.counts_by_status != by_status {
        report.warnings.push(
            ValidationIssue::new(IssueKind::MetadataDrift, "countsByStatus does not match the tasks")
                .field("countsByStatus"),
        );
    }
    if meta.counts_by_category != by_category {
        report.warnings.push(
            ValidationIssue::new(IssueKind::MetadataDrift, "countsByCategory does not match the tasks")
                .field("countsByCategory"),
        );
    }
}
