use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    error::{Error, Result},
    extract::Extractor,
    tantivy_index::SearchIndex,
    walker::{self, DiscoveredFile, WalkOptions},
};

#[derive(Debug, Clone)]
pub struct IndexOptions {
    pub recursive: bool,
    /// Files larger than this many bytes are skipped without being read.
    pub max_file_size: Option<u64>,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            recursive: true,
            max_file_size: Some(
                crate::config::DEFAULT_MAX_FILE_SIZE_MB * 1024 * 1024,
            ),
        }
    }
}

/// Outcome of an indexing run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSummary {
    pub indexed_count: usize,
    pub total_files: usize,
    pub error_count: usize,
    pub skipped_count: usize,
    pub index_path: PathBuf,
}

/// What happened to one file, reported to the progress callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    Indexed,
    Skipped,
    Failed,
}

/// Progress notification sent after each file.
#[derive(Debug, Clone, Copy)]
pub struct Progress<'a> {
    pub position: usize,
    pub total: usize,
    pub file: &'a DiscoveredFile,
    pub outcome: FileOutcome,
}

/// Index every file under `root` (or `root` itself if it is a file).
///
/// Files are extracted and written one at a time, and the batch is committed
/// once at the end. A file that fails to extract or is larger than
/// `max_file_size` is counted and the run continues, as is a directory entry
/// the walk could not read.
pub fn index_path(
    root: &Path,
    index: &SearchIndex,
    extractor: &Extractor,
    options: &IndexOptions,
    mut on_progress: impl FnMut(Progress<'_>),
) -> Result<IndexSummary> {
    if !root.exists() {
        return Err(Error::Argument(format!(
            "path does not exist: {}",
            root.display()
        )));
    }

    let walk = WalkOptions {
        recursive: options.recursive,
        exclude: vec![index.location().to_path_buf()],
    };
    let discovery = walker::discover_files(root, &walk)?;
    let files = discovery.files;
    info!(
        root = %root.display(),
        files = files.len(),
        unreadable = discovery.unreadable.len(),
        "indexing"
    );

    let mut session = index.begin_write()?;
    // Entries the walk could not read count as failed files.
    let mut summary = IndexSummary {
        indexed_count: 0,
        total_files: files.len() + discovery.unreadable.len(),
        error_count: discovery.unreadable.len(),
        skipped_count: 0,
        index_path: index.location().to_path_buf(),
    };

    for (position, file) in files.iter().enumerate() {
        let outcome = if options.max_file_size.is_some_and(|max| file.size > max) {
            debug!(
                path = %file.absolute_path.display(),
                size = file.size,
                "file exceeds size limit, skipping"
            );
            summary.skipped_count += 1;
            FileOutcome::Skipped
        } else {
            match extractor.extract(&file.absolute_path) {
                Ok(record) => {
                    session.index_document(&record)?;
                    debug!(
                        path = %file.absolute_path.display(),
                        content_type = %record.content_type,
                        pages = record.page_count(),
                        "indexed"
                    );
                    summary.indexed_count += 1;
                    FileOutcome::Indexed
                }
                Err(e) => {
                    warn!(path = %file.absolute_path.display(), "extraction failed: {e}");
                    summary.error_count += 1;
                    FileOutcome::Failed
                }
            }
        };

        on_progress(Progress {
            position: position + 1,
            total: files.len(),
            file,
            outcome,
        });
    }

    session.commit()?;
    info!(
        indexed = summary.indexed_count,
        skipped = summary.skipped_count,
        errors = summary.error_count,
        "indexing complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtractConfig;

    fn run(root: &Path, index: &SearchIndex, options: &IndexOptions) -> IndexSummary {
        let extractor = Extractor::new(ExtractConfig::default());
        index_path(root, index, &extractor, options, |_| {}).unwrap()
    }

    #[test]
    fn ingest_and_search() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("hello.md"),
            "# Hello World\n\nThis is about greeting people.",
        )
        .unwrap();
        std::fs::write(
            tmp.path().join("rust.txt"),
            "Rust is a systems programming language.",
        )
        .unwrap();

        let index = SearchIndex::open_in_ram().unwrap();
        let summary = run(tmp.path(), &index, &IndexOptions::default());

        assert_eq!(summary.indexed_count, 2);
        assert_eq!(summary.total_files, 2);
        assert_eq!(summary.error_count, 0);
        let hits = index.search("greeting", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].file_name, "hello.md");
    }

    #[test]
    fn empty_file_does_not_stop_the_batch() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.txt"), "alpha document").unwrap();
        std::fs::write(tmp.path().join("b.txt"), "").unwrap();
        std::fs::write(tmp.path().join("c.txt"), "gamma document").unwrap();

        let index = SearchIndex::open_in_ram().unwrap();
        let summary = run(tmp.path(), &index, &IndexOptions::default());

        assert_eq!(summary.total_files, 3);
        assert_eq!(summary.indexed_count, 3);
        assert_eq!(summary.error_count, 0);
        assert_eq!(index.stats().unwrap().total_documents, 3);

        let listed = index.list_all(10).unwrap();
        let empty = listed.iter().find(|h| h.file_name == "b.txt").unwrap();
        assert_eq!(empty.content_type, crate::document::OCTET_STREAM);
        assert_eq!(index.search("gamma", 10).unwrap().len(), 1);
    }

    #[test]
    fn reindexing_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.txt"), "first version").unwrap();
        std::fs::write(tmp.path().join("b.txt"), "other").unwrap();

        let index = SearchIndex::open_in_ram().unwrap();
        run(tmp.path(), &index, &IndexOptions::default());
        std::fs::write(tmp.path().join("a.txt"), "second version").unwrap();
        run(tmp.path(), &index, &IndexOptions::default());

        assert_eq!(index.stats().unwrap().total_documents, 2);
        assert!(index.search("first", 10).unwrap().is_empty());
        assert_eq!(index.search("second", 10).unwrap().len(), 1);
    }

    #[test]
    fn oversized_files_are_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("small.txt"), "tiny").unwrap();
        std::fs::write(tmp.path().join("big.txt"), "x".repeat(2048)).unwrap();

        let index = SearchIndex::open_in_ram().unwrap();
        let options = IndexOptions {
            max_file_size: Some(1024),
            ..Default::default()
        };
        let summary = run(tmp.path(), &index, &options);

        assert_eq!(summary.total_files, 2);
        assert_eq!(summary.indexed_count, 1);
        assert_eq!(summary.skipped_count, 1);
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_file_is_counted_as_error() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let locked = tmp.path().join("locked.txt");
        std::fs::write(&locked, "secret").unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();
        std::fs::write(tmp.path().join("open.txt"), "public").unwrap();

        // Root ignores permission bits.
        if std::fs::read(&locked).is_ok() {
            return;
        }

        let index = SearchIndex::open_in_ram().unwrap();
        let summary = run(tmp.path(), &index, &IndexOptions::default());
        assert_eq!(summary.indexed_count, 1);
        assert_eq!(summary.error_count, 1);
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_directory_is_counted_as_error() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("open.txt"), "public").unwrap();
        let locked = tmp.path().join("locked");
        std::fs::create_dir(&locked).unwrap();
        std::fs::write(locked.join("secret.txt"), "secret").unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();

        let readable = std::fs::read_dir(&locked).is_ok();
        let index = SearchIndex::open_in_ram().unwrap();
        let extractor = Extractor::new(ExtractConfig::default());
        let result = index_path(tmp.path(), &index, &extractor, &IndexOptions::default(), |_| {});
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();
        // Root ignores permission bits.
        if readable {
            return;
        }

        let summary = result.unwrap();
        assert_eq!(summary.indexed_count, 1);
        assert_eq!(summary.error_count, 1);
        assert_eq!(summary.total_files, 2);
        assert_eq!(index.search("public", 10).unwrap().len(), 1);
    }

    #[test]
    fn progress_is_reported_per_file() {
        let tmp = tempfile::tempdir().unwrap();
        for name in ["a.txt", "b.txt", "c.txt"] {
            std::fs::write(tmp.path().join(name), name).unwrap();
        }

        let index = SearchIndex::open_in_ram().unwrap();
        let extractor = Extractor::new(ExtractConfig::default());
        let mut seen = Vec::new();
        index_path(tmp.path(), &index, &extractor, &IndexOptions::default(), |p| {
            seen.push((p.position, p.total, p.outcome));
        })
        .unwrap();

        assert_eq!(
            seen,
            vec![
                (1, 3, FileOutcome::Indexed),
                (2, 3, FileOutcome::Indexed),
                (3, 3, FileOutcome::Indexed),
            ]
        );
    }

    #[test]
    fn missing_root_is_an_argument_error() {
        let tmp = tempfile::tempdir().unwrap();
        let index = SearchIndex::open_in_ram().unwrap();
        let extractor = Extractor::new(ExtractConfig::default());
        let err = index_path(
            &tmp.path().join("nope"),
            &index,
            &extractor,
            &IndexOptions::default(),
            |_| {},
        )
        .unwrap_err();
        assert!(matches!(err, Error::Argument(_)));
    }

    #[test]
    fn single_file_path() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("one.md");
        std::fs::write(&path, "# One\n\nsolo document").unwrap();
        std::fs::write(tmp.path().join("two.md"), "ignored").unwrap();

        let index = SearchIndex::open_in_ram().unwrap();
        let summary = run(&path, &index, &IndexOptions::default());
        assert_eq!(summary.total_files, 1);
        assert_eq!(index.stats().unwrap().total_documents, 1);
    }
}
