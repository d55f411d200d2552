//! Registry builder: turns a directory of task documents into a `Registry`.
//!
//! Documents are the `*.md` files directly inside the directory, read in file
//! name order so the resulting task order is stable across runs.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::error::BuildError;
use crate::parser::{parse_document, DocumentSource};
use crate::registry::Registry;

/// Find the Markdown documents in `dir`, sorted by file name.
pub fn discover_documents(dir: &Path) -> Result<Vec<PathBuf>, BuildError> {
    let read_dir_err = |source| BuildError::ReadDir {
        path: dir.to_path_buf(),
        source,
    };

    let mut documents = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_dir_err)? {
        let path = entry.map_err(read_dir_err)?.path();
        let is_markdown = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("md"));
        if path.is_file() && is_markdown {
            documents.push(path);
        }
    }

    documents.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(documents)
}

/// Read one document and describe where it came from.
/// A document whose mtime is unavailable is stamped with `now`.
pub fn load_document(path: &Path, now: DateTime<Utc>) -> Result<(DocumentSource, String), BuildError> {
    let text = fs::read_to_string(path).map_err(|source| BuildError::ReadDocument {
        path: path.to_path_buf(),
        source,
    })?;
    let modified = fs::metadata(path)
        .and_then(|m| m.modified())
        .map(DateTime::<Utc>::from)
        .unwrap_or(now);
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let source = DocumentSource::new(name, path.to_string_lossy(), modified);
    Ok((source, text))
}

/// Parse already-loaded documents, in the order given, into one registry.
pub fn build_from_documents<I>(documents: I, now: DateTime<Utc>) -> Registry
where
    I: IntoIterator<Item = (DocumentSource, String)>,
{
    let mut tasks = Vec::new();
    for (source, text) in documents {
        let parsed = parse_document(&text, &source);
        debug!(document = %source.name, tasks = parsed.len(), "parsed document");
        tasks.extend(parsed);
    }
    Registry::from_tasks(tasks, now)
}

/// Build a registry from every document in `dir`, timestamped at `now`.
pub fn build_registry_at(dir: &Path, now: DateTime<Utc>) -> Result<Registry, BuildError> {
    let paths = discover_documents(dir)?;
    let documents = paths
        .iter()
        .map(|p| load_document(p, now))
        .collect::<Result<Vec<_>, _>>()?;
    let registry = build_from_documents(documents, now);
    info!(
        dir = %dir.display(),
        documents = paths.len(),
        tasks = registry.tasks.len(),
        "built registry from documents"
    );
    Ok(registry)
}

/// Build a registry from every document in `dir`.
pub fn build_registry(dir: &Path) -> Result<Registry, BuildError> {
    build_registry_at(dir, Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::Category;
    use chrono::TimeZone;

    fn write(dir: &Path, name: &str, body: &str) {
        fs::write(dir.join(name), body).unwrap();
    }

    #[test]
    fn discovers_markdown_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "b.md", "");
        write(dir.path(), "a.MD", "");
        write(dir.path(), "notes.txt", "");
        fs::create_dir(dir.path().join("nested.md")).unwrap();

        let found = discover_documents(dir.path()).unwrap();
        let names: Vec<_> = found.iter().map(|p| p.file_name().unwrap().to_str().unwrap()).collect();
        assert_eq!(names, vec!["a.MD", "b.md"]);
    }

    #[test]
    fn missing_directory_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = build_registry(&dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, BuildError::ReadDir { .. }));
    }

    #[test]
    fn counters_follow_highest_sequence_across_documents() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let docs = vec![
            (
                DocumentSource::new("one.md", "one.md", now),
                "## TASK-FEAT-003: Three\n\n## TASK-BUG-001: Bug\n".to_string(),
            ),
            (
                DocumentSource::new("two.md", "two.md", now),
                "## TASK-FEAT-010: Ten\n".to_string(),
            ),
        ];
        let registry = build_from_documents(docs, now);

        let ids: Vec<_> = registry.tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["TASK-FEAT-003", "TASK-BUG-001", "TASK-FEAT-010"]);
        let feat = &registry.categories[&Category::Feat];
        assert_eq!((feat.highest_assigned_number, feat.next_available_number), (10, 11));
        assert_eq!(registry.categories[&Category::Doc].highest_assigned_number, 0);
        assert_eq!(registry.metadata.total_task_count, 3);
        assert_eq!(registry.metadata.last_updated, now);
    }

    #[test]
    fn rebuild_of_unchanged_directory_is_identical() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "tasks.md", "## TASK-DOC-001: Guide\n\nSome text.\n");

        let first = build_registry_at(dir.path(), Utc::now()).unwrap();
        let second = build_registry_at(dir.path(), Utc::now()).unwrap();
        assert_eq!(first.tasks, second.tasks);
        assert_eq!(first.categories, second.categories);
    }
}
