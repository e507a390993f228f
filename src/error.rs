use std::path::PathBuf;

use crate::extract::ExtractError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("index error: {0}")]
    Tantivy(#[from] tantivy::TantivyError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("extraction failed: {0}")]
    Extract(#[from] ExtractError),

    /// The index directory is locked by another writer, corrupt, or missing.
    #[error("index unavailable at {}: {reason}", path.display())]
    IndexUnavailable { path: PathBuf, reason: String },

    #[error("invalid argument: {0}")]
    Argument(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("index directory does not exist and could not be created: {}", .0.display())]
    IndexDir(PathBuf),
}

impl Error {
    pub fn index_unavailable(
        path: impl Into<PathBuf>,
        reason: impl ToString,
    ) -> Self {
        Self::IndexUnavailable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
