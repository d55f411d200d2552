//! # Task Registry
//!
//! Builds a structured registry of engineering tasks from Markdown planning
//! documents, validates it, and persists it as a single JSON file.
//!
//! ## Key Features
//!
//! - **Markdown Source of Truth**: Tasks are written as `## TASK-FEAT-001: Title`
//!   headings with `**Key:** value` metadata and `###` sections
//! - **Validation**: Schema, duplicate id, dangling reference, dependency cycle
//!   and counter checks, split into blocking errors and warnings
//! - **Pluggable Storage**: A [`store::TaskProvider`] trait with a cached,
//!   atomically written file store and an in-memory store for tests and demos
//! - **Repository Façade**: Named queries and status transitions in
//!   [`repository::TaskRepository`]
//! - **Terminal Board**: A Kanban board with one column per status
//!
//! ## Quick Start
//!
//! ```bash
//! # Build the registry from a directory of planning documents
//! tasks sync docs/tasks
//!
//! # Check it
//! tasks validate
//!
//! # Work with it
//! tasks list --status in-progress
//! tasks start TASK-FEAT-002
//! tasks board
//! ```
//!
//! The registry lives in `task-registry.json` in the working directory unless
//! `--registry` or `TASKS_REGISTRY` points elsewhere.

pub mod builder;
pub mod config;
pub mod error;
pub mod fields;
pub mod logging;
pub mod parser;
pub mod registry;
pub mod report;
pub mod repository;
pub mod store;
pub mod task;
pub mod validator;
pub mod tui {
    pub mod board;
    pub mod board_run;
    pub mod colors;
}

pub use error::{BuildError, ProviderError, ProviderResult};
pub use registry::Registry;
pub use repository::TaskRepository;
pub use store::{FileProvider, InMemoryProvider, TaskFilter, TaskProvider};
pub use task::{Task, TaskDraft, TaskPatch};
