//! Enumerations and field types for the task registry.
//!
//! This module defines the closed value sets a task is classified by: its
//! category (which also drives id numbering), lifecycle status, priority, and
//! the named free-text sections a source document may carry.

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Closed set of task categories. Each category owns its own id sequence.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Category {
    Feat,
    Bug,
    Doc,
    Test,
    Refactor,
    Perf,
    Sec,
    Infra,
    Ui,
    Data,
}

impl Category {
    pub const ALL: [Category; 10] = [
        Category::Feat,
        Category::Bug,
        Category::Doc,
        Category::Test,
        Category::Refactor,
        Category::Perf,
        Category::Sec,
        Category::Infra,
        Category::Ui,
        Category::Data,
    ];

    /// The upper-case code used inside task ids (`TASK-<code>-NNN`).
    pub fn code(self) -> &'static str {
        match self {
            Category::Feat => "FEAT",
            Category::Bug => "BUG",
            Category::Doc => "DOC",
            Category::Test => "TEST",
            Category::Refactor => "REFACTOR",
            Category::Perf => "PERF",
            Category::Sec => "SEC",
            Category::Infra => "INFRA",
            Category::Ui => "UI",
            Category::Data => "DATA",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Category::Feat => "Feature",
            Category::Bug => "Bug Fix",
            Category::Doc => "Documentation",
            Category::Test => "Testing",
            Category::Refactor => "Refactoring",
            Category::Perf => "Performance",
            Category::Sec => "Security",
            Category::Infra => "Infrastructure",
            Category::Ui => "User Interface",
            Category::Data => "Data",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Category::Feat => "New user-facing functionality",
            Category::Bug => "Defects in existing behaviour",
            Category::Doc => "Guides, references and inline documentation",
            Category::Test => "Test coverage and test infrastructure",
            Category::Refactor => "Structural changes without behaviour change",
            Category::Perf => "Latency, throughput and resource usage work",
            Category::Sec => "Hardening, audits and vulnerability fixes",
            Category::Infra => "Build, deployment and operational tooling",
            Category::Ui => "Layout, styling and interaction work",
            Category::Data => "Schemas, migrations and data quality",
        }
    }

    /// Look up a category by its id code, ignoring case.
    pub fn from_code(code: &str) -> Option<Category> {
        Category::ALL
            .into_iter()
            .find(|c| c.code().eq_ignore_ascii_case(code.trim()))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::from_code(s).ok_or_else(|| format!("unknown category code '{s}'"))
    }
}

/// Task lifecycle status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Pending,
    InProgress,
    Blocked,
    Completed,
    Cancelled,
}

impl Status {
    pub const ALL: [Status; 5] = [
        Status::Pending,
        Status::InProgress,
        Status::Blocked,
        Status::Completed,
        Status::Cancelled,
    ];

    /// Persisted spelling, e.g. `IN_PROGRESS`.
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Pending => "PENDING",
            Status::InProgress => "IN_PROGRESS",
            Status::Blocked => "BLOCKED",
            Status::Completed => "COMPLETED",
            Status::Cancelled => "CANCELLED",
        }
    }

    /// Whether the task no longer needs work.
    pub fn is_closed(self) -> bool {
        matches!(self, Status::Completed | Status::Cancelled)
    }

    /// Parse the free-form spellings found in hand-written documents.
    ///
    /// Accepts the canonical names in any case with spaces, hyphens or
    /// underscores, plus common synonyms ("todo", "wip", "done", ...).
    pub fn parse_loose(raw: &str) -> Option<Status> {
        match normalise_token(raw).as_str() {
            "PENDING" | "TODO" | "OPEN" | "NOT_STARTED" | "NEW" => Some(Status::Pending),
            "IN_PROGRESS" | "INPROGRESS" | "STARTED" | "WIP" | "ACTIVE" => Some(Status::InProgress),
            "BLOCKED" | "ON_HOLD" => Some(Status::Blocked),
            "COMPLETED" | "COMPLETE" | "DONE" | "FINISHED" => Some(Status::Completed),
            "CANCELLED" | "CANCELED" | "WONTFIX" | "WONT_FIX" => Some(Status::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Priority classification for task importance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub const ALL: [Priority; 4] = [Priority::Low, Priority::Medium, Priority::High, Priority::Critical];

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "LOW",
            Priority::Medium => "MEDIUM",
            Priority::High => "HIGH",
            Priority::Critical => "CRITICAL",
        }
    }

    /// Parse the free-form spellings found in hand-written documents.
    pub fn parse_loose(raw: &str) -> Option<Priority> {
        match normalise_token(raw).as_str() {
            "LOW" | "P3" | "MINOR" => Some(Priority::Low),
            "MEDIUM" | "NORMAL" | "P2" => Some(Priority::Medium),
            "HIGH" | "P1" | "MAJOR" => Some(Priority::High),
            "CRITICAL" | "URGENT" | "P0" | "BLOCKER" => Some(Priority::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The named free-text sections recognised inside a task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum SectionKey {
    Requirements,
    DefinitionOfDone,
    VerificationSteps,
    AcceptanceCriteria,
    TechnicalDetails,
    TestingChecklist,
    AdditionalContext,
}

impl SectionKey {
    pub const ALL: [SectionKey; 7] = [
        SectionKey::Requirements,
        SectionKey::DefinitionOfDone,
        SectionKey::VerificationSteps,
        SectionKey::AcceptanceCriteria,
        SectionKey::TechnicalDetails,
        SectionKey::TestingChecklist,
        SectionKey::AdditionalContext,
    ];

    /// Heading text as it appears in source documents.
    pub fn heading(self) -> &'static str {
        match self {
            SectionKey::Requirements => "Requirements",
            SectionKey::DefinitionOfDone => "Definition of Done",
            SectionKey::VerificationSteps => "Verification Steps",
            SectionKey::AcceptanceCriteria => "Acceptance Criteria",
            SectionKey::TechnicalDetails => "Technical Details",
            SectionKey::TestingChecklist => "Testing Checklist",
            SectionKey::AdditionalContext => "Additional Context",
        }
    }

    /// Match a level-3 heading against the known section names.
    ///
    /// Case, surrounding punctuation and the choice of space, hyphen or
    /// underscore between words are ignored.
    pub fn from_heading(heading: &str) -> Option<SectionKey> {
        let wanted = normalise_token(heading);
        SectionKey::ALL
            .into_iter()
            .find(|k| normalise_token(k.heading()) == wanted)
    }
}

/// Available sorting options for task lists.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SortKey {
    Id,
    Priority,
    Status,
    Updated,
}

/// Upper-case a token and collapse every run of separators into `_`,
/// dropping leading/trailing punctuation (emoji, colons, backticks).
fn normalise_token(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_sep = false;
    for ch in raw.chars() {
        if ch.is_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.extend(ch.to_uppercase());
        } else if ch.is_whitespace() || ch == '-' || ch == '_' {
            pending_sep = true;
        } else if ch == '\'' {
            // "won't" and "wont" read the same
        } else {
            pending_sep = true;
        }
    }
    out
}
