use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::Result;

/// A file found under the indexing root.
#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    /// Path relative to the root directory (the file name for a single file).
    pub relative_path: PathBuf,
    /// Fully resolved absolute path.
    pub absolute_path: PathBuf,
    /// Size in bytes.
    pub size: u64,
}

#[derive(Debug, Clone, Default)]
pub struct WalkOptions {
    /// Descend into subdirectories.
    pub recursive: bool,
    /// Directories whose contents are never returned, e.g. the index itself.
    pub exclude: Vec<PathBuf>,
}

/// Everything a walk found: files to index, and the entries that could not
/// be read.
#[derive(Debug, Default)]
pub struct Discovery {
    pub files: Vec<DiscoveredFile>,
    /// Directories or files that failed to list or resolve. The walk
    /// carries on without them.
    pub unreadable: Vec<PathBuf>,
}

/// Collect the files to index under `root`.
///
/// `root` may be a single file. Hidden files and directories (names starting
/// with `.`) are skipped and symlinked directories are not followed.
/// Results are sorted by relative path. Only an unresolvable `root` is an
/// error; anything below it that cannot be read is logged and reported in
/// [`Discovery::unreadable`].
pub fn discover_files(root: &Path, options: &WalkOptions) -> Result<Discovery> {
    let canonical_root = root.canonicalize()?;
    let exclude: Vec<PathBuf> = options
        .exclude
        .iter()
        .filter_map(|p| p.canonicalize().ok())
        .collect();

    if canonical_root.is_file() {
        let size = std::fs::metadata(&canonical_root)?.len();
        let relative_path = canonical_root
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| canonical_root.clone());
        return Ok(Discovery {
            files: vec![DiscoveredFile {
                relative_path,
                absolute_path: canonical_root,
                size,
            }],
            unreadable: Vec::new(),
        });
    }

    let walk = Walk {
        root: &canonical_root,
        recursive: options.recursive,
        exclude: &exclude,
    };
    let mut found = Discovery::default();
    walk.dir(&canonical_root, &mut found);
    found
        .files
        .sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    found.unreadable.sort();
    Ok(found)
}

struct Walk<'a> {
    root: &'a Path,
    recursive: bool,
    exclude: &'a [PathBuf],
}

impl Walk<'_> {
    fn dir(&self, current: &Path, found: &mut Discovery) {
        if self.exclude.iter().any(|ex| current.starts_with(ex)) {
            debug!(dir = %current.display(), "skipping excluded directory");
            return;
        }

        let entries = match std::fs::read_dir(current) {
            Ok(entries) => entries,
            Err(e) => return unreadable(found, current, &e),
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    unreadable(found, current, &e);
                    continue;
                }
            };
            let file_name = entry.file_name();
            if file_name.to_string_lossy().starts_with('.') {
                continue;
            }

            let path = entry.path();
            let file_type = match entry.file_type() {
                Ok(file_type) => file_type,
                Err(e) => {
                    unreadable(found, &path, &e);
                    continue;
                }
            };

            if file_type.is_dir() {
                if self.recursive {
                    self.dir(&path, found);
                }
            } else if file_type.is_symlink() {
                // Broken links are skipped.
                let Ok(resolved) = path.canonicalize() else {
                    continue;
                };
                // Directory links are not followed, so cycles cannot occur.
                if resolved.is_file() {
                    self.push(found, &path, resolved);
                }
            } else if file_type.is_file() {
                match path.canonicalize() {
                    Ok(resolved) => self.push(found, &path, resolved),
                    Err(e) => unreadable(found, &path, &e),
                }
            }
        }
    }

    fn push(&self, found: &mut Discovery, original_path: &Path, absolute_path: PathBuf) {
        let size = match std::fs::metadata(&absolute_path) {
            Ok(meta) => meta.len(),
            Err(e) => return unreadable(found, original_path, &e),
        };
        let relative_path = original_path
            .strip_prefix(self.root)
            .unwrap_or(original_path)
            .to_path_buf();

        found.files.push(DiscoveredFile {
            relative_path,
            absolute_path,
            size,
        });
    }
}

fn unreadable(found: &mut Discovery, path: &Path, err: &std::io::Error) {
    warn!(path = %path.display(), "cannot read, skipping: {err}");
    found.unreadable.push(path.to_path_buf());
}
