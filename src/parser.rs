//! Markdown task document parser.
//!
//! A document is read as a CommonMark event stream and consumed in a single
//! pass by [`DocumentAccumulator`], which tracks the currently open task and
//! section. Level-2 headings of the form `TASK-<CODE>-<NNN>: <title>` open a
//! task, level-3 headings open a named section, and everything between the
//! task heading and its first section is scanned for `**Key:** value`
//! metadata lines.
//!
//! The parser never fails. Headings it does not understand, unknown category
//! codes and unrecognised section names are skipped with a debug log, and
//! correctness is left to the validator.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use regex::Regex;
use tracing::debug;

use crate::fields::*;
use crate::task::{format_task_id, Progress, Task};

static TASK_HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^TASK-([A-Z][A-Z0-9]*)-(\d{3,})\s*:\s*(.+?)\s*$").expect("valid heading regex")
});

/// `**Key:** value` or `**Key**: value`, optionally as a list item. The key
/// must be bold so prose such as `Status: waiting on legal` stays prose.
static METADATA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?:>\s*)*(?:[-*+]\s+)?(?:\*\*|__)\s*([A-Za-z][A-Za-z ]*?)\s*(?::\s*(?:\*\*|__)|(?:\*\*|__)\s*:)\s*(.*?)\s*$",
    )
    .expect("valid metadata regex")
});

/// Where a document came from. `modified` stands in for missing
/// created/updated dates so unchanged documents rebuild identically.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSource {
    pub name: String,
    pub path: String,
    pub modified: DateTime<Utc>,
}

impl DocumentSource {
    pub fn new(name: impl Into<String>, path: impl Into<String>, modified: DateTime<Utc>) -> Self {
        DocumentSource {
            name: name.into(),
            path: path.into(),
            modified,
        }
    }
}

/// Parse one document into the tasks it declares, in document order.
pub fn parse_document(text: &str, source: &DocumentSource) -> Vec<Task> {
    let mut acc = DocumentAccumulator::new(source);
    let options = Options::ENABLE_TASKLISTS | Options::ENABLE_STRIKETHROUGH;
    for event in Parser::new_ext(text, options) {
        acc.feed(event);
    }
    acc.finish()
}

/// The id, category and title recovered from a task heading.
#[derive(Debug, Clone, PartialEq)]
struct TaskHeader {
    id: String,
    category: Category,
    sequence: u32,
    title: String,
}

fn parse_task_heading(text: &str) -> Option<TaskHeader> {
    let caps = TASK_HEADING_RE.captures(text)?;
    let code = &caps[1];
    let Some(category) = Category::from_code(code) else {
        debug!(code, heading = text, "skipping task heading with unknown category");
        return None;
    };
    let sequence: u32 = caps[2].parse().ok()?;
    Some(TaskHeader {
        id: format_task_id(category, sequence),
        category,
        sequence,
        title: caps[3].to_string(),
    })
}

/// Finite-state accumulator threaded through one pass over the event stream.
struct DocumentAccumulator<'s> {
    source: &'s DocumentSource,
    finished: Vec<Task>,
    open: Option<OpenTask>,
    /// Nesting depth of open Start/End pairs; 0 between top-level blocks.
    depth: usize,
    /// Text of a top-level heading being read.
    heading: Option<(HeadingLevel, String)>,
    /// Whether the top-level block being written is a paragraph.
    in_paragraph: bool,
    writer: MarkupWriter,
}

impl<'s> DocumentAccumulator<'s> {
    fn new(source: &'s DocumentSource) -> Self {
        DocumentAccumulator {
            source,
            finished: Vec::new(),
            open: None,
            depth: 0,
            heading: None,
            in_paragraph: false,
            writer: MarkupWriter::default(),
        }
    }

    fn feed(&mut self, event: Event<'_>) {
        if self.heading.is_some() {
            match event {
                Event::Start(_) => self.depth += 1,
                Event::End(_) => {
                    self.depth -= 1;
                    if self.depth == 0 {
                        if let Some((level, text)) = self.heading.take() {
                            self.on_heading(level, text.trim());
                        }
                    }
                }
                Event::Text(t) | Event::Code(t) => self.push_heading_text(&t),
                Event::SoftBreak | Event::HardBreak => self.push_heading_text(" "),
                _ => {}
            }
            return;
        }

        match event {
            Event::Start(Tag::Heading { level, .. }) if self.depth == 0 => {
                self.depth += 1;
                self.heading = Some((level, String::new()));
            }
            Event::Start(tag) => {
                if self.depth == 0 {
                    self.in_paragraph = matches!(tag, Tag::Paragraph);
                }
                self.depth += 1;
                self.writer.start(tag);
            }
            Event::End(tag) => {
                self.writer.end(tag);
                self.depth = self.depth.saturating_sub(1);
                if self.depth == 0 {
                    self.finish_block(self.in_paragraph);
                }
            }
            other => {
                self.writer.inline(other);
                if self.depth == 0 {
                    self.finish_block(false);
                }
            }
        }
    }

    fn push_heading_text(&mut self, text: &str) {
        if let Some((_, buf)) = self.heading.as_mut() {
            buf.push_str(text);
        }
    }

    fn on_heading(&mut self, level: HeadingLevel, text: &str) {
        match level {
            HeadingLevel::H1 | HeadingLevel::H2 => {
                // Any top-level boundary ends the task in progress.
                self.close_task();
                if level == HeadingLevel::H2 {
                    match parse_task_heading(text) {
                        Some(header) => self.open = Some(OpenTask::new(header)),
                        None => debug!(heading = text, document = %self.source.name, "ignoring non-task heading"),
                    }
                }
            }
            HeadingLevel::H3 => {
                if let Some(task) = self.open.as_mut() {
                    task.begin_section(text);
                }
            }
            deeper => {
                if let Some(task) = self.open.as_mut() {
                    let hashes = "#".repeat(heading_rank(deeper));
                    task.push_block(format!("{hashes} {text}"), false);
                }
            }
        }
    }

    fn finish_block(&mut self, paragraph: bool) {
        self.in_paragraph = false;
        let text = self.writer.take();
        let text = text.trim_end();
        if text.trim().is_empty() {
            return;
        }
        if let Some(task) = self.open.as_mut() {
            task.push_block(text.to_string(), paragraph);
        }
    }

    fn close_task(&mut self) {
        if let Some(open) = self.open.take() {
            self.finished.push(open.into_task(self.source));
        }
    }

    fn finish(mut self) -> Vec<Task> {
        if !self.writer.is_empty() {
            self.finish_block(self.in_paragraph);
        }
        self.close_task();
        for task in &mut self.finished {
            task.progress = Progress::from_sections(&task.sections);
        }
        self.finished
    }
}

fn heading_rank(level: HeadingLevel) -> usize {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

/// A top-level block read before the task's first section.
#[derive(Debug)]
struct PreambleBlock {
    text: String,
    /// Only paragraphs can become the description.
    paragraph: bool,
}

/// A task whose heading has been seen and whose body is still being read.
#[derive(Debug)]
struct OpenTask {
    header: TaskHeader,
    /// Top-level blocks between the task heading and its first section.
    preamble: Vec<PreambleBlock>,
    /// Heading text and body of the section being accumulated.
    section: Option<(String, String)>,
    sections: BTreeMap<SectionKey, String>,
}

impl OpenTask {
    fn new(header: TaskHeader) -> Self {
        OpenTask {
            header,
            preamble: Vec::new(),
            section: None,
            sections: BTreeMap::new(),
        }
    }

    fn begin_section(&mut self, heading: &str) {
        self.flush_section();
        self.section = Some((heading.to_string(), String::new()));
    }

    fn push_block(&mut self, block: String, paragraph: bool) {
        match self.section.as_mut() {
            Some((_, body)) => {
                if !body.is_empty() {
                    body.push_str("\n\n");
                }
                body.push_str(&block);
            }
            None if self.sections.is_empty() => self.preamble.push(PreambleBlock { text: block, paragraph }),
            None => {}
        }
    }

    fn flush_section(&mut self) {
        let Some((heading, body)) = self.section.take() else {
            return;
        };
        let Some(key) = SectionKey::from_heading(&heading) else {
            debug!(task = %self.header.id, section = %heading, "dropping unrecognised section");
            return;
        };
        let body = body.trim().to_string();
        // A repeated section heading continues the earlier one.
        self.sections
            .entry(key)
            .and_modify(|existing| {
                if !body.is_empty() {
                    if !existing.is_empty() {
                        existing.push_str("\n\n");
                    }
                    existing.push_str(&body);
                }
            })
            .or_insert(body);
    }

    fn into_task(mut self, source: &DocumentSource) -> Task {
        self.flush_section();
        let meta = TaskMetadata::scan(&self.preamble, &self.header.id);

        let created_at = meta.created.unwrap_or(source.modified);
        let updated_at = meta.updated.unwrap_or(created_at);
        Task {
            id: self.header.id,
            category: self.header.category,
            sequence_number: self.header.sequence,
            title: self.header.title,
            description: meta.description.unwrap_or_default(),
            status: meta.status.unwrap_or(Status::Pending),
            priority: meta.priority.unwrap_or(Priority::Medium),
            assignee: meta.assignee,
            created_at,
            updated_at,
            estimated_effort: meta.estimated_effort,
            actual_effort: meta.actual_effort,
            dependencies: meta.dependencies,
            related_tasks: meta.related_tasks,
            sections: self.sections,
            progress: None,
            source_document: Some(source.name.clone()),
            source_path: Some(source.path.clone()),
        }
    }
}

/// Recognised metadata keys and the spellings that map to them.
#[derive(Debug, Clone, Copy, PartialEq)]
enum MetaKey {
    Status,
    Priority,
    Assignee,
    Created,
    Updated,
    EstimatedEffort,
    ActualEffort,
    Dependencies,
    RelatedTasks,
}

impl MetaKey {
    fn from_label(label: &str) -> Option<MetaKey> {
        let label = label.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
        let key = match label.as_str() {
            "status" | "state" => MetaKey::Status,
            "priority" => MetaKey::Priority,
            "assignee" | "assigned to" | "assigned" | "owner" => MetaKey::Assignee,
            "created" | "created at" | "created on" | "date created" => MetaKey::Created,
            "updated" | "updated at" | "last updated" | "modified" => MetaKey::Updated,
            "estimated time" | "estimated effort" | "estimate" | "effort" | "estimated hours" => {
                MetaKey::EstimatedEffort
            }
            "actual time" | "actual effort" | "time spent" => MetaKey::ActualEffort,
            "dependencies" | "depends on" | "dependency" | "blocked by" => MetaKey::Dependencies,
            "related" | "related tasks" | "related to" | "see also" => MetaKey::RelatedTasks,
            _ => return None,
        };
        Some(key)
    }
}

/// Inline metadata recovered from a task's preamble.
#[derive(Debug, Default)]
struct TaskMetadata {
    status: Option<Status>,
    priority: Option<Priority>,
    assignee: Option<String>,
    created: Option<DateTime<Utc>>,
    updated: Option<DateTime<Utc>>,
    estimated_effort: Option<String>,
    actual_effort: Option<String>,
    dependencies: Vec<String>,
    related_tasks: Vec<String>,
    description: Option<String>,
}

impl TaskMetadata {
    /// Metadata may sit in any preamble block; the description is the first
    /// paragraph without any.
    fn scan(blocks: &[PreambleBlock], task_id: &str) -> TaskMetadata {
        let mut meta = TaskMetadata::default();
        for block in blocks {
            let mut has_metadata = false;
            for line in block.text.lines() {
                if meta.apply_line(line, task_id) {
                    has_metadata = true;
                }
            }
            if block.paragraph && !has_metadata && meta.description.is_none() {
                meta.description = Some(block.text.trim().to_string());
            }
        }
        meta
    }

    /// Returns whether the line carried a recognised metadata key.
    fn apply_line(&mut self, line: &str, task_id: &str) -> bool {
        let Some(caps) = METADATA_RE.captures(line) else {
            return false;
        };
        let Some(key) = MetaKey::from_label(&caps[1]) else {
            return false;
        };
        let value = clean_value(&caps[2]);
        match key {
            MetaKey::Status => {
                self.status = Status::parse_loose(&value);
                if self.status.is_none() {
                    debug!(task = task_id, value = %value, "unrecognised status, defaulting to PENDING");
                }
            }
            MetaKey::Priority => {
                self.priority = Priority::parse_loose(&value);
                if self.priority.is_none() {
                    debug!(task = task_id, value = %value, "unrecognised priority, defaulting to MEDIUM");
                }
            }
            MetaKey::Assignee => self.assignee = optional_text(&value),
            MetaKey::Created => self.created = parse_timestamp(&value),
            MetaKey::Updated => self.updated = parse_timestamp(&value),
            MetaKey::EstimatedEffort => self.estimated_effort = optional_text(&value),
            MetaKey::ActualEffort => self.actual_effort = optional_text(&value),
            MetaKey::Dependencies => self.dependencies = parse_id_list(&value),
            MetaKey::RelatedTasks => self.related_tasks = parse_id_list(&value),
        }
        true
    }
}

/// Strip emphasis/code markers that wrap a metadata value.
fn clean_value(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c| c == '*' || c == '_' || c == '`')
        .trim()
        .to_string()
}

fn optional_text(value: &str) -> Option<String> {
    let v = value.trim();
    if v.is_empty() || v == "-" || v.eq_ignore_ascii_case("none") || v.eq_ignore_ascii_case("unassigned") {
        None
    } else {
        Some(v.to_string())
    }
}

/// Comma-separated ids; the literal `none` means an empty list.
fn parse_id_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|part| part.trim().trim_matches('`').trim())
        .filter(|part| !part.is_empty() && !part.eq_ignore_ascii_case("none"))
        .map(str::to_string)
        .collect()
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM[:SS]`, `YYYY-MM-DDTHH:MM:SS` and
/// `YYYY-MM-DD` (midnight UTC). Trailing commentary after the first token is
/// tolerated for the date-only forms.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(naive.and_utc());
        }
    }
    let first = value.split_whitespace().next()?;
    if let Ok(dt) = DateTime::parse_from_rfc3339(first) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(first, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Re-serialises block and inline markup into plain-text Markdown so
/// lists, checkboxes, emphasis and code survive in section text.
#[derive(Debug, Default)]
struct MarkupWriter {
    out: String,
    /// Open lists; `Some(n)` is the next number of an ordered list.
    lists: Vec<Option<u64>>,
    quote_depth: usize,
    /// Set right after an item marker so the item's first paragraph stays inline.
    item_fresh: bool,
    links: Vec<String>,
}

impl MarkupWriter {
    fn is_empty(&self) -> bool {
        self.out.is_empty()
    }

    fn take(&mut self) -> String {
        self.lists.clear();
        self.quote_depth = 0;
        self.item_fresh = false;
        self.links.clear();
        std::mem::take(&mut self.out)
    }

    fn start_line(&mut self) {
        if !self.out.is_empty() {
            self.out.push('\n');
        }
        for _ in 0..self.quote_depth {
            self.out.push_str("> ");
        }
    }

    fn continuation_indent(&mut self) {
        for _ in 0..self.lists.len() {
            self.out.push_str("  ");
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => {
                if self.item_fresh {
                    self.item_fresh = false;
                } else {
                    self.start_line();
                    self.continuation_indent();
                }
            }
            Tag::Heading { level, .. } => {
                self.start_line();
                self.out.push_str(&"#".repeat(heading_rank(level)));
                self.out.push(' ');
            }
            Tag::BlockQuote(_) => {
                self.quote_depth += 1;
            }
            Tag::CodeBlock(kind) => {
                self.item_fresh = false;
                self.start_line();
                self.continuation_indent();
                self.out.push_str("```");
                if let CodeBlockKind::Fenced(lang) = kind {
                    self.out.push_str(&lang);
                }
                self.out.push('\n');
            }
            Tag::List(first) => {
                self.item_fresh = false;
                self.lists.push(first);
            }
            Tag::Item => {
                self.start_line();
                for _ in 1..self.lists.len() {
                    self.out.push_str("  ");
                }
                match self.lists.last_mut() {
                    Some(Some(n)) => {
                        self.out.push_str(&format!("{n}. "));
                        *n += 1;
                    }
                    _ => self.out.push_str("- "),
                }
                self.item_fresh = true;
            }
            Tag::Emphasis => self.out.push('*'),
            Tag::Strong => self.out.push_str("**"),
            Tag::Strikethrough => self.out.push_str("~~"),
            Tag::Link { dest_url, .. } => {
                self.out.push('[');
                self.links.push(dest_url.to_string());
            }
            Tag::Image { dest_url, .. } => {
                self.out.push_str("![");
                self.links.push(dest_url.to_string());
            }
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::BlockQuote(_) => self.quote_depth = self.quote_depth.saturating_sub(1),
            TagEnd::CodeBlock => {
                if !self.out.ends_with('\n') {
                    self.out.push('\n');
                }
                for _ in 0..self.quote_depth {
                    self.out.push_str("> ");
                }
                self.continuation_indent();
                self.out.push_str("```");
            }
            TagEnd::List(_) => {
                self.lists.pop();
            }
            TagEnd::Item => self.item_fresh = false,
            TagEnd::Emphasis => self.out.push('*'),
            TagEnd::Strong => self.out.push_str("**"),
            TagEnd::Strikethrough => self.out.push_str("~~"),
            TagEnd::Link | TagEnd::Image => {
                let dest = self.links.pop().unwrap_or_default();
                self.out.push_str("](");
                self.out.push_str(&dest);
                self.out.push(')');
            }
            _ => {}
        }
    }

    fn inline(&mut self, event: Event<'_>) {
        match event {
            Event::Text(text) => {
                self.item_fresh = false;
                self.out.push_str(&text);
            }
            Event::Code(code) => {
                self.item_fresh = false;
                self.out.push('`');
                self.out.push_str(&code);
                self.out.push('`');
            }
            Event::Html(html) | Event::InlineHtml(html) => self.out.push_str(&html),
            Event::SoftBreak | Event::HardBreak => {
                self.start_line();
                self.continuation_indent();
            }
            Event::TaskListMarker(checked) => {
                self.out.push_str(if checked { "[x] " } else { "[ ] " });
            }
            Event::Rule => {
                self.start_line();
                self.out.push_str("---");
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn source() -> DocumentSource {
        DocumentSource::new("tasks.md", "docs/tasks.md", Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap())
    }

    const DOC: &str = r#"# Sprint backlog

Intro text that belongs to no task.

## TASK-FEAT-001: User login

**Status:** In Progress
**Priority:** High
**Assignee:** alex
**Created:** 2024-01-15
**Estimated Time:** 3 days
**Dependencies:** TASK-DOC-002, none
**Related Tasks:** none

Users sign in with email and password.

### Requirements

- Email + password form
- *Rate limited* after `5` attempts

### Definition of Done

- [x] Form renders
- [ ] Errors shown

### Notes

dropped entirely

## TASK-DOC-002: Write auth guide

Describe the login flow.

### Verification Steps

1. Read it
2. Follow it

```sh
tasks view TASK-DOC-002
```
"#;

    #[test]
    fn parses_tasks_metadata_and_sections() {
        let tasks = parse_document(DOC, &source());
        assert_eq!(tasks.len(), 2);

        let login = &tasks[0];
        assert_eq!(login.id, "TASK-FEAT-001");
        assert_eq!(login.category, Category::Feat);
        assert_eq!(login.sequence_number, 1);
        assert_eq!(login.title, "User login");
        assert_eq!(login.status, Status::InProgress);
        assert_eq!(login.priority, Priority::High);
        assert_eq!(login.assignee.as_deref(), Some("alex"));
        assert_eq!(login.created_at, Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap());
        assert_eq!(login.updated_at, login.created_at);
        assert_eq!(login.estimated_effort.as_deref(), Some("3 days"));
        assert_eq!(login.dependencies, vec!["TASK-DOC-002".to_string()]);
        assert!(login.related_tasks.is_empty());
        assert_eq!(login.description, "Users sign in with email and password.");
        assert_eq!(login.source_document.as_deref(), Some("tasks.md"));

        assert_eq!(
            login.sections[&SectionKey::Requirements],
            "- Email + password form\n- *Rate limited* after `5` attempts"
        );
        assert_eq!(login.sections[&SectionKey::DefinitionOfDone], "- [x] Form renders\n- [ ] Errors shown");
        assert_eq!(login.sections.len(), 2);
        assert_eq!(login.progress, Some(Progress { completed: 1, total: 2, percentage: 50 }));
    }

    #[test]
    fn defaults_apply_when_metadata_missing() {
        let tasks = parse_document(DOC, &source());
        let guide = &tasks[1];
        assert_eq!(guide.status, Status::Pending);
        assert_eq!(guide.priority, Priority::Medium);
        assert_eq!(guide.assignee, None);
        assert_eq!(guide.created_at, source().modified);
        assert_eq!(guide.description, "Describe the login flow.");
        assert_eq!(guide.progress, None);
        assert_eq!(
            guide.sections[&SectionKey::VerificationSteps],
            "1. Read it\n2. Follow it\n\n```sh\ntasks view TASK-DOC-002\n```"
        );
    }

    #[test]
    fn empty_document_yields_nothing() {
        assert!(parse_document("", &source()).is_empty());
        assert!(parse_document("just prose\n\n- and a list", &source()).is_empty());
    }

    #[test]
    fn malformed_and_unknown_headings_are_skipped() {
        let doc = "## TASK-FEAT-1: too short\n\ntext\n\n## TASK-NOPE-001: unknown code\n\n## Task FEAT 002\n\n## TASK-BUG-004: Real one\n";
        let tasks = parse_document(doc, &source());
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, "TASK-BUG-004");
    }

    #[test]
    fn non_task_heading_closes_open_task() {
        let doc = "## TASK-BUG-001: Crash\n\n### Requirements\n\nfix it\n\n## Appendix\n\n### Requirements\n\nnot part of the bug\n";
        let tasks = parse_document(doc, &source());
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].sections[&SectionKey::Requirements], "fix it");
    }

    #[test]
    fn progress_combines_all_sections() {
        let doc = "## TASK-TEST-003: Coverage\n\n### Definition of Done\n\n- [x] a\n- [x] b\n- [ ] c\n\n### Testing Checklist\n\n- [x] d\n- [ ] e\n- [ ] f\n- [ ] g\n";
        let tasks = parse_document(doc, &source());
        assert_eq!(tasks[0].progress, Some(Progress { completed: 3, total: 7, percentage: 43 }));
    }

    #[test]
    fn nested_lists_keep_indentation() {
        let doc = "## TASK-UI-001: Layout\n\n### Technical Details\n\n- outer\n  - [ ] inner\n- **bold** tail\n";
        let tasks = parse_document(doc, &source());
        assert_eq!(
            tasks[0].sections[&SectionKey::TechnicalDetails],
            "- outer\n  - [ ] inner\n- **bold** tail"
        );
    }

    #[test]
    fn section_names_match_case_insensitively() {
        let doc = "## TASK-SEC-010: Audit\n\n### ACCEPTANCE CRITERIA\n\nall green\n\n### additional-context\n\nsee ticket\n";
        let tasks = parse_document(doc, &source());
        assert_eq!(tasks[0].sections[&SectionKey::AcceptanceCriteria], "all green");
        assert_eq!(tasks[0].sections[&SectionKey::AdditionalContext], "see ticket");
    }

    #[test]
    fn metadata_variants_are_recognised() {
        let doc = "## TASK-PERF-002: Cache\n\n- **Status**: done\n- __Priority:__ critical\n- **Depends on:** `TASK-PERF-001`, TASK-INFRA-003\n- **Last Updated:** 2024-02-10T08:30:00Z\n";
        let tasks = parse_document(doc, &source());
        let t = &tasks[0];
        assert_eq!(t.status, Status::Completed);
        assert_eq!(t.priority, Priority::Critical);
        assert_eq!(t.dependencies, vec!["TASK-PERF-001".to_string(), "TASK-INFRA-003".to_string()]);
        assert_eq!(t.updated_at, Utc.with_ymd_and_hms(2024, 2, 10, 8, 30, 0).unwrap());
        assert_eq!(t.description, "");
    }

    #[test]
    fn description_is_first_plain_paragraph() {
        let doc = "## TASK-DOC-004: Guide\n\n**Status:** done\n\n- note one\n- note two\n\n```\ncode first\n```\n\n#### Aside\n\nThe real description.\n\nSecond paragraph.\n";
        let tasks = parse_document(doc, &source());
        assert_eq!(tasks[0].status, Status::Completed);
        assert_eq!(tasks[0].description, "The real description.");
    }

    #[test]
    fn unbolded_key_value_prose_is_not_metadata() {
        let doc = "## TASK-SEC-002: Contract review\n\n**Priority:** high\n\nStatus: waiting on legal\n";
        let tasks = parse_document(doc, &source());
        assert_eq!(tasks[0].status, Status::Pending);
        assert_eq!(tasks[0].priority, Priority::High);
        assert_eq!(tasks[0].description, "Status: waiting on legal");
    }

    #[test]
    fn repeated_sections_are_concatenated() {
        let doc = "## TASK-DATA-001: Migrate\n\n### Requirements\n\nfirst\n\n### Requirements\n\nsecond\n";
        let tasks = parse_document(doc, &source());
        assert_eq!(tasks[0].sections[&SectionKey::Requirements], "first\n\nsecond");
    }

    #[test]
    fn reparsing_is_deterministic() {
        let a = parse_document(DOC, &source());
        let b = parse_document(DOC, &source());
        assert_eq!(a, b);
    }

    #[test]
    fn timestamps_accept_several_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 0).unwrap();
        assert_eq!(parse_timestamp("2024-05-06 07:08"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-06T07:08:00+00:00"), Some(expected));
        assert_eq!(
            parse_timestamp("2024-05-06 (kickoff)"),
            Some(Utc.with_ymd_and_hms(2024, 5, 6, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_timestamp("last tuesday"), None);
    }
}
