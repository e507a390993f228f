use std::path::Path;

use sha2::{Digest, Sha256};

/// Number of hex characters kept from the path digest.
pub const ID_LEN: usize = 16;

/// A stable document identifier derived from the absolute file path.
///
/// The id is the SHA-256 of the path truncated to [`ID_LEN`] hex characters.
/// Re-indexing the same path always produces the same id, which is what lets
/// the index replace documents instead of duplicating them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentId(String);

impl DocumentId {
    /// Generate the id for an absolute path.
    pub fn from_path(absolute_path: &Path) -> Self {
        Self::from_path_str(&absolute_path.to_string_lossy())
    }

    pub fn from_path_str(absolute_path: &str) -> Self {
        let digest = Sha256::digest(absolute_path.as_bytes());
        let hex = digest
            .iter()
            .take(ID_LEN / 2)
            .map(|b| format!("{b:02x}"))
            .collect();
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DocumentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
