//! `tasks` - command-line front end for the task registry.
//!
//! ## Key Commands
//!
//! - `tasks sync <dir>` - Rebuild the registry from Markdown documents
//! - `tasks validate` - Report errors and warnings; exits non-zero on errors
//! - `tasks list` / `tasks view <id>` - Query tasks
//! - `tasks add` / `update` / `start` / `complete` / `block` / `delete` - Edit tasks
//! - `tasks board` - Kanban board by status
//! - `tasks export` / `tasks backup` - CSV export and timestamped copies
//!
//! The registry path, cache TTL and log filter come from `--registry`,
//! `--cache-ttl` and `--log-level` or their `TASKS_*` environment variables.

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use task_registry::fields::Status;
use task_registry::logging::init_subscriber;
use task_registry::task::{TaskDraft, TaskPatch};

mod cli;
mod cmd;

use cli::Cli;
use cmd::*;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_subscriber(&cli.log_level);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = cli.store_config();
    let repo = config.repository();

    match cli.command {
        Commands::Sync { dir, dry_run } => cmd_sync(&repo, &dir, dry_run),

        Commands::Validate { docs } => cmd_validate(&repo, docs.as_deref()),

        Commands::List {
            all, category, status, priority, assignee, text, has_deps, blocked, sort, limit,
        } => cmd_list(&repo, all, category, status, priority, assignee, text, has_deps, blocked, sort, limit),

        Commands::View { id, deps } => cmd_view(&repo, &id, deps),

        Commands::Add {
            category, title, desc, priority, status, assignee, estimate, depends_on, related,
        } => {
            let mut draft = TaskDraft::new(category, title);
            draft.description = desc.unwrap_or_default();
            draft.priority = priority;
            draft.status = status;
            draft.assignee = assignee;
            draft.estimated_effort = estimate;
            draft.dependencies = depends_on;
            draft.related_tasks = related;
            cmd_add(&repo, draft)
        }

        Commands::Update {
            id, title, desc, priority, assignee, unassign, estimate, actual, depends_on, related,
        } => {
            let patch = TaskPatch {
                title,
                description: desc,
                priority,
                assignee: if unassign { Some(None) } else { assignee.map(Some) },
                estimated_effort: estimate.map(Some),
                actual_effort: actual.map(Some),
                dependencies: depends_on,
                related_tasks: related,
                ..Default::default()
            };
            cmd_update(&repo, &id, patch)
        }

        Commands::Status { id, status } => cmd_status(&repo, &id, status),
        Commands::Start { id } => cmd_status(&repo, &id, Status::InProgress),
        Commands::Complete { id } => cmd_status(&repo, &id, Status::Completed),
        Commands::Block { id } => cmd_status(&repo, &id, Status::Blocked),

        Commands::Delete { id } => cmd_delete(&repo, &id),

        Commands::Search { text } => cmd_search(&repo, &text),

        Commands::Stats { json } => cmd_stats(&repo, json),

        Commands::Export { output, all } => cmd_export(&repo, &output, all),

        Commands::Backup => cmd_backup(&config),

        Commands::Health => cmd_health(&repo, &config),

        Commands::Completions { shell } => {
            cmd_completions(shell);
            Ok(())
        }

        Commands::Board => cmd_board(&repo),
    }
}
