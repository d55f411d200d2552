//! Command implementations for the CLI interface.
//!
//! Every handler works through a [`TaskRepository`], so the same code drives
//! the file store in production and the in-memory store in tests.

use std::cmp::Reverse;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{Local, Utc};
use clap::Subcommand;
use clap_complete::{generate, Shell};
use tracing::{info, warn};

use task_registry::builder::build_registry;
use task_registry::config::StoreConfig;
use task_registry::fields::*;
use task_registry::report::{format_stats, format_task, format_validation, print_table, render_csv};
use task_registry::repository::TaskRepository;
use task_registry::store::TaskFilter;
use task_registry::task::{Task, TaskDraft, TaskPatch};
use task_registry::tui::board_run::run_board;
use task_registry::validator::validate;

#[derive(Subcommand)]
pub enum Commands {
    /// Rebuild the registry from a directory of Markdown documents.
    Sync {
        /// Directory holding the planning documents (*.md).
        dir: PathBuf,
        /// Build and validate only; do not write the registry.
        #[arg(long)]
        dry_run: bool,
    },

    /// Validate the stored registry, or a fresh build of a document directory.
    Validate {
        /// Validate a build of this directory instead of the stored registry.
        #[arg(long)]
        docs: Option<PathBuf>,
    },

    /// List tasks with optional filters.
    List {
        /// Include completed and cancelled tasks.
        #[arg(long)]
        all: bool,
        /// Filter by category. May be repeated.
        #[arg(long, value_enum)]
        category: Vec<Category>,
        /// Filter by status. May be repeated.
        #[arg(long, value_enum)]
        status: Vec<Status>,
        /// Filter by priority. May be repeated.
        #[arg(long, value_enum)]
        priority: Vec<Priority>,
        /// Filter by assignee (case-insensitive). May be repeated.
        #[arg(long)]
        assignee: Vec<String>,
        /// Substring of id, title or description.
        #[arg(long)]
        text: Option<String>,
        /// Only tasks with (true) or without (false) dependencies.
        #[arg(long)]
        has_deps: Option<bool>,
        /// Only blocked tasks.
        #[arg(long)]
        blocked: bool,
        /// Sort key.
        #[arg(long, value_enum, default_value_t = SortKey::Id)]
        sort: SortKey,
        /// Limit number of rows printed.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// View a single task by id.
    View {
        /// Task id, e.g. TASK-FEAT-001.
        id: String,
        /// Also show what the task depends on and what depends on it.
        #[arg(long)]
        deps: bool,
    },

    /// Add a new task under the next number of its category.
    Add {
        /// Category of the new task.
        #[arg(value_enum)]
        category: Category,
        /// Short title for the task.
        title: String,
        /// Optional longer description.
        #[arg(long)]
        desc: Option<String>,
        #[arg(long, value_enum, default_value_t = Priority::Medium)]
        priority: Priority,
        #[arg(long, value_enum, default_value_t = Status::Pending)]
        status: Status,
        #[arg(long)]
        assignee: Option<String>,
        /// Estimated effort, free text (e.g. "3d").
        #[arg(long)]
        estimate: Option<String>,
        /// Comma-separated ids this task depends on.
        #[arg(long = "depends-on", value_delimiter = ',')]
        depends_on: Vec<String>,
        /// Comma-separated related ids.
        #[arg(long, value_delimiter = ',')]
        related: Vec<String>,
    },

    /// Update fields on a task.
    Update {
        /// Task id to update.
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        desc: Option<String>,
        #[arg(long, value_enum)]
        priority: Option<Priority>,
        #[arg(long)]
        assignee: Option<String>,
        /// Remove the assignee.
        #[arg(long, conflicts_with = "assignee")]
        unassign: bool,
        #[arg(long)]
        estimate: Option<String>,
        #[arg(long)]
        actual: Option<String>,
        /// Replace the dependency list (comma-separated).
        #[arg(long = "depends-on", value_delimiter = ',')]
        depends_on: Option<Vec<String>>,
        /// Replace the related list (comma-separated).
        #[arg(long, value_delimiter = ',')]
        related: Option<Vec<String>>,
    },

    /// Set a task's status.
    Status {
        id: String,
        #[arg(value_enum)]
        status: Status,
    },

    /// Mark a task IN_PROGRESS.
    Start { id: String },

    /// Mark a task COMPLETED.
    Complete { id: String },

    /// Mark a task BLOCKED.
    Block { id: String },

    /// Delete a task. Its number is never reused.
    Delete { id: String },

    /// Search id, title and description.
    Search { text: String },

    /// Show registry statistics.
    Stats {
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Export tasks to CSV.
    Export {
        /// Output file path.
        #[arg(long, default_value = "tasks.csv")]
        output: PathBuf,
        /// Include completed and cancelled tasks.
        #[arg(long)]
        all: bool,
    },

    /// Copy the registry file into a timestamped backup.
    Backup,

    /// Check that the store can be read.
    Health,

    /// Generate shell completion scripts.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Launch the status board.
    Board,
}

/// Build the registry from `dir`, validate it and replace the stored one.
///
/// A registry with validation errors is never written, so the last good
/// file stays in place.
pub fn cmd_sync(repo: &TaskRepository, dir: &Path, dry_run: bool) -> Result<()> {
    let mut registry =
        build_registry(dir).with_context(|| format!("failed to build registry from {}", dir.display()))?;

    let report = validate(&registry);
    print!("{}", format_validation(&report));
    if !report.is_valid {
        warn!(errors = report.errors.len(), dir = %dir.display(), "sync refused");
        bail!("refusing to sync: the built registry has {} validation error(s)", report.errors.len());
    }

    let task_count = registry.tasks.len();
    if dry_run {
        println!("Dry run: {task_count} task(s) built from {}", dir.display());
        return Ok(());
    }

    registry.mark_synced(Utc::now());
    repo.provider()
        .replace_all(registry)
        .context("failed to write the registry")?;
    info!(tasks = task_count, dir = %dir.display(), "registry synced");
    println!("Synced {task_count} task(s) from {}", dir.display());
    Ok(())
}

/// Print a validation report; fails when the registry has errors.
pub fn cmd_validate(repo: &TaskRepository, docs: Option<&Path>) -> Result<()> {
    let report = match docs {
        Some(dir) => validate(
            &build_registry(dir).with_context(|| format!("failed to build registry from {}", dir.display()))?,
        ),
        None => repo.provider().validate().context("failed to read the registry")?,
    };
    print!("{}", format_validation(&report));
    if !report.is_valid {
        bail!("validation failed with {} error(s)", report.errors.len());
    }
    Ok(())
}

/// Filter, sort and print tasks.
#[allow(clippy::too_many_arguments)]
pub fn cmd_list(
    repo: &TaskRepository,
    all: bool,
    categories: Vec<Category>,
    statuses: Vec<Status>,
    priorities: Vec<Priority>,
    assignees: Vec<String>,
    text: Option<String>,
    has_dependencies: Option<bool>,
    blocked: bool,
    sort: SortKey,
    limit: Option<usize>,
) -> Result<()> {
    let show_closed = all || statuses.iter().any(|s| s.is_closed());
    let filter = TaskFilter {
        categories,
        statuses,
        priorities,
        assignees,
        text,
        has_dependencies,
        is_blocked: blocked.then_some(true),
    };

    let mut tasks: Vec<Task> = repo
        .provider()
        .query(&filter)?
        .into_iter()
        .filter(|t| show_closed || !t.status.is_closed())
        .collect();
    sort_tasks(&mut tasks, sort);
    if let Some(n) = limit {
        tasks.truncate(n);
    }

    print_table(&tasks);
    Ok(())
}

fn sort_tasks(tasks: &mut [Task], sort: SortKey) {
    match sort {
        SortKey::Id => tasks.sort_by(|a, b| (a.category, a.sequence_number).cmp(&(b.category, b.sequence_number))),
        SortKey::Priority => tasks.sort_by(|a, b| {
            Reverse(a.priority)
                .cmp(&Reverse(b.priority))
                .then_with(|| a.id.cmp(&b.id))
        }),
        SortKey::Status => tasks.sort_by(|a, b| a.status.cmp(&b.status).then_with(|| a.id.cmp(&b.id))),
        SortKey::Updated => tasks.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id))),
    }
}

/// View detailed information about a specific task.
pub fn cmd_view(repo: &TaskRepository, id: &str, deps: bool) -> Result<()> {
    let Some(task) = repo.find_by_id(id)? else {
        bail!("task not found: {id}");
    };
    print!("{}", format_task(&task));

    if deps {
        let dependencies = repo.get_dependencies(id)?;
        let dependents = repo.find_dependents(id)?;
        println!("\nDepends on ({}):", dependencies.len());
        print_table(&dependencies);
        println!("\nNeeded by ({}):", dependents.len());
        print_table(&dependents);
    }
    Ok(())
}

pub fn cmd_add(repo: &TaskRepository, draft: TaskDraft) -> Result<()> {
    let task = repo.create(draft)?;
    println!("Created {}: {}", task.id, task.title);
    Ok(())
}

pub fn cmd_update(repo: &TaskRepository, id: &str, patch: TaskPatch) -> Result<()> {
    if patch.is_empty() {
        bail!("nothing to update; pass at least one field");
    }
    let task = repo.provider().update(id, patch)?;
    println!("Updated {}", task.id);
    Ok(())
}

pub fn cmd_status(repo: &TaskRepository, id: &str, status: Status) -> Result<()> {
    let task = match status {
        Status::InProgress => repo.start(id)?,
        Status::Completed => repo.complete(id)?,
        Status::Blocked => repo.block(id)?,
        Status::Cancelled => repo.cancel(id)?,
        Status::Pending => repo.provider().set_status(id, status)?,
    };
    println!("{} is now {}", task.id, task.status);
    Ok(())
}

pub fn cmd_delete(repo: &TaskRepository, id: &str) -> Result<()> {
    if !repo.provider().delete(id)? {
        bail!("task not found: {id}");
    }
    println!("Deleted {id}");
    Ok(())
}

pub fn cmd_search(repo: &TaskRepository, text: &str) -> Result<()> {
    let tasks = repo.provider().search(text)?;
    if tasks.is_empty() {
        println!("No tasks match '{text}'");
    } else {
        print_table(&tasks);
    }
    Ok(())
}

pub fn cmd_stats(repo: &TaskRepository, json: bool) -> Result<()> {
    let stats = repo.provider().stats()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        print!("{}", format_stats(&stats));
    }
    Ok(())
}

/// Export tasks to CSV, skipping closed tasks unless `all` is set.
pub fn cmd_export(repo: &TaskRepository, output: &Path, all: bool) -> Result<()> {
    let tasks: Vec<Task> = repo
        .find_all()?
        .into_iter()
        .filter(|t| all || !t.status.is_closed())
        .collect();

    fs::write(output, render_csv(&tasks)).with_context(|| format!("failed to write {}", output.display()))?;
    println!("Exported {} task(s) to {}", tasks.len(), output.display());
    Ok(())
}

/// Create a timestamped backup of the registry file.
pub fn create_backup(config: &StoreConfig) -> io::Result<PathBuf> {
    let registry_path = &config.registry_path;
    if !registry_path.exists() {
        return Err(io::Error::new(io::ErrorKind::NotFound, "registry file does not exist"));
    }

    let backup_dir = config.backup_dir();
    fs::create_dir_all(&backup_dir)?;

    let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S");
    let file_name = registry_path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("task-registry.json");
    let backup_path = backup_dir.join(format!("{timestamp}_{file_name}"));

    fs::copy(registry_path, &backup_path)?;
    Ok(backup_path)
}

pub fn cmd_backup(config: &StoreConfig) -> Result<()> {
    let backup_path = create_backup(config)
        .with_context(|| format!("failed to back up {}", config.registry_path.display()))?;
    println!("Backup created: {}", backup_path.display());
    Ok(())
}

pub fn cmd_health(repo: &TaskRepository, config: &StoreConfig) -> Result<()> {
    let kind = repo.provider().kind();
    if !repo.provider().health_check() {
        bail!("{kind} store at {} is unreadable", config.registry_path.display());
    }
    println!("{kind} store at {}: ok", config.registry_path.display());
    Ok(())
}

/// Generate shell completion scripts.
pub fn cmd_completions(shell: Shell) {
    use crate::cli::Cli;
    use clap::CommandFactory;

    let mut app = Cli::command();
    let app_name = app.get_name().to_string();
    generate(shell, &mut app, app_name, &mut io::stdout());
}

pub fn cmd_board(repo: &TaskRepository) -> Result<()> {
    run_board(repo.clone()).context("board failed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use task_registry::store::{InMemoryProvider, TaskProvider};
    use tempfile::TempDir;

    const GOOD_DOC: &str = "# Plan\n\n\
## TASK-FEAT-001: Login\n\n**Status:** done\n\n\
## TASK-FEAT-002: Logout\n\n**Dependencies:** TASK-FEAT-001\n";

    const CYCLIC_DOC: &str = "## TASK-BUG-001: A\n\n**Dependencies:** TASK-BUG-002\n\n\
## TASK-BUG-002: B\n\n**Dependencies:** TASK-BUG-001\n";

    fn memory_repo() -> (Arc<InMemoryProvider>, TaskRepository) {
        let provider = Arc::new(InMemoryProvider::seeded());
        (provider.clone(), TaskRepository::new(provider))
    }

    fn docs(content: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("plan.md"), content).unwrap();
        dir
    }

    #[test]
    fn sync_replaces_the_stored_registry() {
        let (provider, repo) = memory_repo();
        let dir = docs(GOOD_DOC);
        cmd_sync(&repo, dir.path(), false).unwrap();

        let registry = provider.read_registry().unwrap();
        assert_eq!(registry.tasks.len(), 2);
        assert!(registry.metadata.last_sync_timestamp.is_some());
        assert_eq!(registry.tasks[0].status, Status::Completed);
    }

    #[test]
    fn sync_refuses_invalid_build_and_keeps_store() {
        let (provider, repo) = memory_repo();
        let dir = docs(CYCLIC_DOC);
        assert!(cmd_sync(&repo, dir.path(), false).is_err());
        assert_eq!(provider.read_all().unwrap().len(), 6);
    }

    #[test]
    fn dry_run_writes_nothing() {
        let (provider, repo) = memory_repo();
        let dir = docs(GOOD_DOC);
        cmd_sync(&repo, dir.path(), true).unwrap();
        assert_eq!(provider.read_all().unwrap().len(), 6);
    }

    #[test]
    fn validate_fails_on_errors_only() {
        let (_, repo) = memory_repo();
        cmd_validate(&repo, None).unwrap();
        let dir = docs(CYCLIC_DOC);
        assert!(cmd_validate(&repo, Some(dir.path())).is_err());
    }

    #[test]
    fn priority_sort_puts_critical_first() {
        let (_, repo) = memory_repo();
        let mut tasks = repo.find_all().unwrap();
        sort_tasks(&mut tasks, SortKey::Priority);
        assert_eq!(tasks[0].id, "TASK-BUG-001");
        assert_eq!(tasks.last().unwrap().id, "TASK-DOC-001");
    }

    #[test]
    fn id_sort_follows_category_then_number() {
        let (_, repo) = memory_repo();
        let mut tasks = repo.find_all().unwrap();
        tasks.reverse();
        sort_tasks(&mut tasks, SortKey::Id);
        let ids: Vec<_> = tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["TASK-FEAT-001", "TASK-FEAT-002", "TASK-FEAT-003", "TASK-BUG-001", "TASK-DOC-001", "TASK-SEC-001"]
        );
    }

    #[test]
    fn delete_of_missing_task_fails() {
        let (_, repo) = memory_repo();
        assert!(cmd_delete(&repo, "TASK-FEAT-404").is_err());
        cmd_delete(&repo, "TASK-FEAT-003").unwrap();
    }

    #[test]
    fn empty_update_is_rejected() {
        let (_, repo) = memory_repo();
        assert!(cmd_update(&repo, "TASK-FEAT-001", TaskPatch::default()).is_err());
    }

    #[test]
    fn export_skips_closed_tasks_by_default() {
        let (_, repo) = memory_repo();
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out.csv");
        cmd_export(&repo, &out, false).unwrap();
        let csv = fs::read_to_string(&out).unwrap();
        assert_eq!(csv.lines().count(), 1 + 5);
        assert!(!csv.lines().any(|l| l.starts_with("TASK-FEAT-001,")));
    }

    #[test]
    fn backup_copies_registry_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("task-registry.json");
        fs::write(&path, "{}").unwrap();
        let config = StoreConfig::new(&path);

        let backup = create_backup(&config).unwrap();
        assert!(backup.starts_with(dir.path().join("backup")));
        assert_eq!(fs::read_to_string(backup).unwrap(), "{}");
    }

    #[test]
    fn backup_of_missing_registry_is_not_found() {
        let dir = TempDir::new().unwrap();
        let config = StoreConfig::new(dir.path().join("none.json"));
        assert_eq!(create_backup(&config).unwrap_err().kind(), io::ErrorKind::NotFound);
    }
}
