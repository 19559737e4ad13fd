//! Error types for cairn operations
//!
//! Only traversal-level failures are represented here. Per-file problems
//! (unreadable, oversized, undecodable, unresolved imports) are absorbed by the
//! tree builder and show up as counters in [`crate::IndexStats`].

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CairnError {
    #[error("Workspace root {} is not accessible: {source}", .path.display())]
    RootInaccessible {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Workspace root {} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("Glob pattern error in '{pattern}': {message}")]
    GlobPattern { pattern: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config already exists at {}", .0.display())]
    ConfigExists(PathBuf),

    #[error("Config parse error: {0}")]
    ConfigParse(String),
}

impl CairnError {
    /// True for errors raised before any index state was touched.
    pub fn is_traversal(&self) -> bool {
        matches!(
            self,
            Self::RootInaccessible { .. } | Self::NotADirectory(_) | Self::GlobPattern { .. }
        )
    }
}
