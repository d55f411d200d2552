//! Plain-text rendering for the command-line front end.

use std::fmt::Write as _;

use crate::fields::*;
use crate::store::TaskStats;
use crate::task::Task;
use crate::validator::{ValidationIssue, ValidationReport};

/// Print tasks as a fixed-width table.
pub fn print_table(tasks: &[Task]) {
    println!(
        "{:<16} {:<11} {:<8} {:<10} {:<5} {}",
        "ID", "Status", "Pri", "Assignee", "Done", "Title"
    );
    for t in tasks {
        let assignee = t.assignee.clone().unwrap_or_else(|| "-".into());
        let done = t
            .progress
            .map(|p| format!("{}%", p.percentage))
            .unwrap_or_else(|| "-".into());
        println!(
            "{:<16} {:<11} {:<8} {:<10} {:<5} {}",
            t.id,
            t.status,
            t.priority,
            truncate(&assignee, 10),
            done,
            t.title
        );
    }
}

/// Truncate a string to a maximum width, adding ellipsis if needed.
pub fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut out = String::new();
        for (i, ch) in s.chars().enumerate() {
            if i + 1 >= width {
                out.push('…');
                break;
            }
            out.push(ch);
        }
        out
    }
}

/// Full detail view of one task.
pub fn format_task(task: &Task) -> String {
    let dash = || "-".to_string();
    let list = |ids: &[String]| if ids.is_empty() { dash() } else { ids.join(", ") };

    let mut out = String::new();
    let _ = writeln!(out, "ID:           {}", task.id);
    let _ = writeln!(out, "Title:        {}", task.title);
    let _ = writeln!(out, "Category:     {} ({})", task.category, task.category.display_name());
    let _ = writeln!(out, "Status:       {}", task.status);
    let _ = writeln!(out, "Priority:     {}", task.priority);
    let _ = writeln!(out, "Assignee:     {}", task.assignee.clone().unwrap_or_else(dash));
    let _ = writeln!(out, "Estimate:     {}", task.estimated_effort.clone().unwrap_or_else(dash));
    let _ = writeln!(out, "Actual:       {}", task.actual_effort.clone().unwrap_or_else(dash));
    let _ = writeln!(out, "Depends on:   {}", list(task.dependencies.as_slice()));
    let _ = writeln!(out, "Related:      {}", list(task.related_tasks.as_slice()));
    if let Some(p) = task.progress {
        let _ = writeln!(out, "Progress:     {}/{} ({}%)", p.completed, p.total, p.percentage);
    }
    let _ = writeln!(out, "Created UTC:  {}", task.created_at.to_rfc3339());
    let _ = writeln!(out, "Updated UTC:  {}", task.updated_at.to_rfc3339());
    if let Some(doc) = &task.source_document {
        let _ = writeln!(out, "Source:       {doc}");
    }
    let description = if task.description.is_empty() { "-" } else { task.description.as_str() };
    let _ = writeln!(out, "Description:\n{description}");
    for (key, body) in &task.sections {
        let _ = writeln!(out, "\n### {}\n{}", key.heading(), body);
    }
    out
}

/// Summary line, then errors, then warnings.
pub fn format_validation(report: &ValidationReport) -> String {
    let mut out = String::new();
    let verdict = if report.is_valid { "valid" } else { "INVALID" };
    let _ = writeln!(
        out,
        "Registry is {verdict}: {} error(s), {} warning(s)",
        report.errors.len(),
        report.warnings.len()
    );
    for issue in &report.errors {
        let _ = writeln!(out, "  error:   {}", describe_issue(issue));
    }
    for issue in &report.warnings {
        let _ = writeln!(out, "  warning: {}", describe_issue(issue));
    }
    out
}

fn describe_issue(issue: &ValidationIssue) -> String {
    match (&issue.task_id, &issue.field) {
        (Some(id), Some(field)) => format!("[{id} {field}] {}", issue.message),
        (Some(id), None) => format!("[{id}] {}", issue.message),
        (None, Some(field)) => format!("[{field}] {}", issue.message),
        (None, None) => issue.message.clone(),
    }
}

pub fn format_stats(stats: &TaskStats) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Total tasks:        {}", stats.total);
    let _ = writeln!(out, "Completion rate:    {}%", stats.completion_rate);
    let _ = writeln!(out, "With dependencies:  {}", stats.with_dependencies);
    let _ = writeln!(out, "By status:");
    for status in Status::ALL {
        let n = stats.by_status.get(&status).copied().unwrap_or(0);
        let _ = writeln!(out, "  {:<12} {n}", status.as_str());
    }
    let _ = writeln!(out, "By priority:");
    for priority in Priority::ALL {
        let n = stats.by_priority.get(&priority).copied().unwrap_or(0);
        let _ = writeln!(out, "  {:<12} {n}", priority.as_str());
    }
    let _ = writeln!(out, "By category:");
    for (category, n) in &stats.by_category {
        let _ = writeln!(out, "  {:<12} {n}", category.code());
    }
    out
}

/// Quote a CSV field when it contains a delimiter, quote or newline.
fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Render tasks as CSV with a header row.
pub fn render_csv(tasks: &[Task]) -> String {
    let mut csv = String::from(
        "ID,Category,Title,Status,Priority,Assignee,Estimate,Dependencies,Related,Progress,CreatedUTC,UpdatedUTC,Description\n",
    );
    for t in tasks {
        let progress = t.progress.map(|p| p.percentage.to_string()).unwrap_or_default();
        let _ = writeln!(
            csv,
            "{},{},{},{},{},{},{},{},{},{},{},{},{}",
            t.id,
            t.category,
            escape_csv(&t.title),
            t.status,
            t.priority,
            escape_csv(t.assignee.as_deref().unwrap_or("")),
            escape_csv(t.estimated_effort.as_deref().unwrap_or("")),
            t.dependencies.join(";"),
            t.related_tasks.join(";"),
            progress,
            t.created_at.to_rfc3339(),
            t.updated_at.to_rfc3339(),
            escape_csv(&t.description)
        );
    }
    csv
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use crate::task::TaskDraft;
    use crate::validator::validate;
    use chrono::Utc;

    #[test]
    fn truncate_adds_ellipsis() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghijkl", 5), "abcd…");
    }

    #[test]
    fn validation_lists_errors_before_warnings() {
        let now = Utc::now();
        let mut a = TaskDraft::new(Category::Feat, "a").into_task(1, now);
        a.dependencies = vec!["TASK-FEAT-001".into(), "TASK-BUG-404".into()];
        let report = validate(&Registry::from_tasks(vec![a], now));

        let text = format_validation(&report);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "Registry is INVALID: 1 error(s), 1 warning(s)");
        assert!(lines[1].starts_with("  error:   [TASK-FEAT-001 dependencies] dependency cycle"));
        assert!(lines[2].starts_with("  warning: [TASK-FEAT-001 dependencies]"));
    }

    #[test]
    fn csv_escapes_commas_and_quotes() {
        let mut t = TaskDraft::new(Category::Doc, "Say \"hi\", please").into_task(1, Utc::now());
        t.dependencies = vec!["TASK-DOC-002".into(), "TASK-DOC-003".into()];
        let csv = render_csv(&[t]);
        let row = csv.lines().nth(1).unwrap();
        assert!(row.starts_with("TASK-DOC-001,DOC,\"Say \"\"hi\"\", please\",PENDING,MEDIUM,,,TASK-DOC-002;TASK-DOC-003,"));
    }

    #[test]
    fn task_detail_includes_sections() {
        let mut draft = TaskDraft::new(Category::Test, "Cover");
        draft.sections.insert(SectionKey::TestingChecklist, "- [x] unit".into());
        let text = format_task(&draft.into_task(2, Utc::now()));
        assert!(text.contains("ID:           TASK-TEST-002"));
        assert!(text.contains("Progress:     1/1 (100%)"));
        assert!(text.contains("### Testing Checklist\n- [x] unit"));
    }
}
