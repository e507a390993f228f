use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Environment variable overriding the default index location.
pub const INDEX_DIR_ENV: &str = "DOCSEEK_INDEX_DIR";

#[derive(Debug, Clone)]
pub struct IndexDir {
    root: PathBuf,
}

impl IndexDir {
    /// Resolve the index directory from, in order of priority:
    /// 1. An explicit path (from --index-dir)
    /// 2. The DOCSEEK_INDEX_DIR environment variable
    /// 3. The XDG data directory (~/.local/share/docseek/index)
    ///
    /// With `create` set the directory is created when missing; otherwise a
    /// missing directory is reported as an unavailable index.
    pub fn resolve(explicit: Option<&Path>, create: bool) -> Result<Self> {
        let root = if let Some(path) = explicit {
            path.to_path_buf()
        } else if let Ok(val) = std::env::var(INDEX_DIR_ENV) {
            PathBuf::from(val)
        } else {
            xdg::BaseDirectories::with_prefix("docseek")
                .get_data_home()
                .ok_or_else(|| {
                    Error::Config(
                        "could not determine XDG data home directory".into(),
                    )
                })?
                .join("index")
        };

        if create {
            std::fs::create_dir_all(&root)
                .map_err(|_| Error::IndexDir(root.clone()))?;
        } else if !root.is_dir() {
            return Err(Error::index_unavailable(
                &root,
                "index directory does not exist; run `docseek index` first",
            ));
        }

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_with_explicit_path() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = IndexDir::resolve(Some(tmp.path()), false).unwrap();
        assert_eq!(dir.root(), tmp.path());
    }

    #[test]
    fn create_makes_missing_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("nested").join("index");
        let dir = IndexDir::resolve(Some(&target), true).unwrap();

        assert!(target.is_dir());
        assert_eq!(dir.root(), target);
    }

    #[test]
    fn missing_directory_without_create_is_unavailable() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("nope");
        let err = IndexDir::resolve(Some(&target), false).unwrap_err();

        assert!(matches!(err, Error::IndexUnavailable { .. }));
        assert!(!target.exists());
    }
}
