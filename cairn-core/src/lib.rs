//! Cairn Core - Incremental codebase index for query-driven context retrieval
//!
//! Rebuilds a content-addressed (Merkle) view of a workspace, extracts
//! declared symbols and imports with a lightweight lexical scan, and answers
//! free-text queries (stack traces, error logs, requests) with a small,
//! ranked bundle of relevant files.

pub mod config;
pub mod digest;
pub mod error;
pub mod extract;
pub mod index;
pub mod relevance;
pub mod resolve;

pub use config::Config;
pub use digest::Digest;
pub use error::CairnError;
pub use index::{ContextIndex, FileRecord, FileState, IgnoreFilter, IndexStats};
pub use relevance::{BundleOutcome, ContextBundle, ContextEntry, SelectionReason};

/// Result type alias for cairn operations
pub type Result<T> = std::result::Result<T, CairnError>;
