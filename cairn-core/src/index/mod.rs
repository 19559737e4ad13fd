//! In-memory workspace index: rebuild on demand, query for context.

mod build;
mod content;
mod discovery;
mod tables;
mod tree;

pub use discovery::{IgnoreFilter, BUILTIN_IGNORES};
pub use tables::{DependencyTable, SymbolTable};
pub use tree::MerkleTree;

use crate::config::Config;
use crate::digest::Digest;
use crate::error::CairnError;
use crate::relevance::{ContextBundle, RelevanceEngine};
use build::TreeBuilder;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

/// Statistics from a rebuild
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub files_indexed: usize,
    pub files_changed: usize,
    pub files_too_large: usize,
    pub files_undecodable: usize,
    pub files_unreadable: usize,
    pub files_removed: usize,
    pub directories: usize,
    pub symbols: usize,
    pub dependency_edges: usize,
    pub root_digest: String,
    pub elapsed_ms: u64,
}

/// What the last traversal could do with a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileState {
    /// Read, hashed, and scanned for symbols and imports
    Indexed,
    /// Over the size ceiling; sentinel digest, content never read
    TooLarge,
    /// Not valid UTF-8; digest only
    Undecodable,
}

/// One file observed by the last traversal
#[derive(Debug, Clone, Serialize)]
pub struct FileRecord {
    pub path: PathBuf,
    pub relative: PathBuf,
    pub digest: Digest,
    pub size_bytes: u64,
    pub state: FileState,
    /// Position in walk order; ranking tie-breaker
    pub ordinal: usize,
}

impl FileRecord {
    pub(crate) fn new(
        path: &Path,
        relative: &Path,
        digest: Digest,
        size_bytes: u64,
        state: FileState,
    ) -> Self {
        Self {
            path: path.to_path_buf(),
            relative: relative.to_path_buf(),
            digest,
            size_bytes,
            state,
            ordinal: 0,
        }
    }
}

/// All mutable index state. Owned by `ContextIndex` only.
#[derive(Debug, Default, Clone)]
pub(crate) struct IndexState {
    pub records: HashMap<PathBuf, FileRecord>,
    pub symbols: SymbolTable,
    pub dependencies: DependencyTable,
    /// Raw import strings per file, kept for re-resolution
    pub raw_imports: HashMap<PathBuf, Vec<String>>,
    pub tree: Option<MerkleTree>,
}

/// Workspace index handle.
///
/// There is no process-wide instance: the host creates one and passes it
/// where it is needed. `rebuild` takes `&mut self`, so queries cannot run
/// against a half-finished rebuild without the caller's own synchronization.
#[derive(Debug, Default)]
pub struct ContextIndex {
    config: Config,
    root: Option<PathBuf>,
    state: IndexState,
}

impl ContextIndex {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            root: None,
            state: IndexState::default(),
        }
    }

    /// Index for `workspace_root` using its `.cairn/config.toml` (or defaults)
    pub fn for_workspace(workspace_root: &Path) -> crate::Result<Self> {
        Ok(Self::new(Config::discover(workspace_root)?))
    }

    /// Get current config
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Walk the workspace and bring the index up to date.
    ///
    /// `ignore_patterns` are unioned with the built-in exclusions and the
    /// config's `[ignore]` patterns. Fails only if the root is inaccessible or
    /// a pattern is malformed; in that case the previous index is untouched.
    pub fn rebuild<S: AsRef<str>>(
        &mut self,
        workspace_root: &Path,
        ignore_patterns: &[S],
    ) -> crate::Result<IndexStats> {
        let started = Instant::now();

        let root = fs::canonicalize(workspace_root).map_err(|source| {
            CairnError::RootInaccessible {
                path: workspace_root.to_path_buf(),
                source,
            }
        })?;

        let patterns: Vec<&str> = self
            .config
            .ignore
            .patterns
            .iter()
            .map(String::as_str)
            .chain(ignore_patterns.iter().map(AsRef::as_ref))
            .collect();
        let filter = IgnoreFilter::new(&patterns, self.config.indexing.respect_gitignore)?;
        let files = filter.walk(&root)?;

        if self.root.as_deref() != Some(root.as_path()) {
            if let Some(previous) = &self.root {
                info!(previous = %previous.display(), "workspace root changed; discarding index");
            }
            self.state = IndexState::default();
            self.root = Some(root.clone());
        }

        let builder = TreeBuilder::new(
            &root,
            self.config.indexing.batch_size,
            self.config.indexing.max_file_bytes,
        );
        let outcome = builder.build(&files, &mut self.state);

        let stats = IndexStats {
            files_indexed: self.count_state(FileState::Indexed),
            files_changed: outcome.changed.len(),
            files_too_large: self.count_state(FileState::TooLarge),
            files_undecodable: self.count_state(FileState::Undecodable),
            files_unreadable: outcome.unreadable,
            files_removed: outcome.removed,
            directories: self
                .state
                .tree
                .as_ref()
                .map_or(0, MerkleTree::directory_count),
            symbols: self.state.symbols.len(),
            dependency_edges: self.state.dependencies.edge_count(),
            root_digest: self.root_digest().map(|d| d.to_hex()).unwrap_or_default(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            root = %root.display(),
            files = files.len(),
            batches = outcome.batches,
            changed = stats.files_changed,
            removed = stats.files_removed,
            symbols = stats.symbols,
            edges = stats.dependency_edges,
            elapsed_ms = stats.elapsed_ms,
            "rebuild complete"
        );

        Ok(stats)
    }

    /// Rank indexed files against free text and return their contents.
    /// Never fails; see [`ContextBundle::outcome`].
    pub fn find_relevant_context(&self, query: &str) -> ContextBundle {
        if self.root.is_none() {
            return ContextBundle::not_indexed();
        }
        RelevanceEngine::new(&self.state, &self.config.retrieval).find(query)
    }

    /// Canonical workspace root of the last successful rebuild
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Whole-workspace fingerprint from the last rebuild
    pub fn root_digest(&self) -> Option<Digest> {
        self.state.tree.as_ref().map(MerkleTree::root_digest)
    }

    /// Digest of a root-relative directory from the last rebuild
    pub fn directory_digest(&self, relative: &Path) -> Option<Digest> {
        self.state.tree.as_ref()?.directory_digest(relative)
    }

    /// Look up a file by absolute or root-relative path
    pub fn record(&self, path: &Path) -> Option<&FileRecord> {
        if path.is_absolute() {
            self.state.records.get(path)
        } else {
            let root = self.root.as_ref()?;
            self.state.records.get(&root.join(path))
        }
    }

    /// All records in walk order
    pub fn records(&self) -> Vec<&FileRecord> {
        let mut records: Vec<&FileRecord> = self.state.records.values().collect();
        records.sort_by_key(|r| r.ordinal);
        records
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.state.symbols
    }

    pub fn dependencies(&self) -> &DependencyTable {
        &self.state.dependencies
    }

    fn count_state(&self, state: FileState) -> usize {
        self.state
            .records
            .values()
            .filter(|r| r.state == state)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn setup_repo(n: usize) -> TempDir {
        let dir = TempDir::new().unwrap();
        for i in 0..n {
            write(
                dir.path(),
                &format!("src/file_{}.rs", i),
                &format!("pub fn handler_{}() {{}}\n", i),
            );
        }
        dir
    }

    #[test]
    fn test_rebuild_indexes_all_files() {
        let dir = setup_repo(5);
        let mut index = ContextIndex::default();
        let stats = index.rebuild::<&str>(dir.path(), &[]).unwrap();

        assert_eq!(stats.files_indexed, 5);
        assert_eq!(stats.files_changed, 5);
        assert_eq!(stats.directories, 2);
        assert_eq!(stats.root_digest.len(), 64);
        assert!(index.symbols().files_declaring("handler_3").len() == 1);

        // Unchanged workspace: nothing re-indexed
        let again = index.rebuild::<&str>(dir.path(), &[]).unwrap();
        assert_eq!(again.files_changed, 0);
        assert_eq!(again.root_digest, stats.root_digest);
    }

    #[test]
    fn test_small_batches_cover_every_file() {
        let dir = setup_repo(23);
        let mut config = Config::default();
        config.indexing.batch_size = 4;
        let mut index = ContextIndex::new(config);
        let stats = index.rebuild::<&str>(dir.path(), &[]).unwrap();
        assert_eq!(stats.files_indexed, 23);
        assert_eq!(index.records().len(), 23);
    }

    #[test]
    fn test_records_are_in_walk_order() {
        let dir = setup_repo(3);
        let mut index = ContextIndex::default();
        index.rebuild::<&str>(dir.path(), &[]).unwrap();
        let order: Vec<_> = index
            .records()
            .iter()
            .map(|r| r.relative.to_string_lossy().to_string())
            .collect();
        assert_eq!(order, vec!["src/file_0.rs", "src/file_1.rs", "src/file_2.rs"]);
    }

    #[test]
    fn test_record_lookup_accepts_relative_paths() {
        let dir = setup_repo(1);
        let mut index = ContextIndex::default();
        index.rebuild::<&str>(dir.path(), &[]).unwrap();

        let record = index.record(Path::new("src/file_0.rs")).unwrap();
        assert_eq!(record.state, FileState::Indexed);
        assert!(record.path.is_absolute());
        assert!(index.record(&record.path).is_some());
    }

    #[test]
    fn test_failed_rebuild_keeps_previous_index() {
        let dir = setup_repo(2);
        let mut index = ContextIndex::default();
        let stats = index.rebuild::<&str>(dir.path(), &[]).unwrap();

        let err = index.rebuild(dir.path(), &["src/[bad"]).unwrap_err();
        assert!(err.is_traversal());
        let err = index
            .rebuild::<&str>(&dir.path().join("missing"), &[])
            .unwrap_err();
        assert!(matches!(err, CairnError::RootInaccessible { .. }));

        assert_eq!(
            index.root_digest().map(|d| d.to_hex()),
            Some(stats.root_digest)
        );
        assert_eq!(index.records().len(), 2);
    }

    #[test]
    fn test_switching_roots_discards_previous_index() {
        let first = setup_repo(2);
        let second = setup_repo(1);
        let mut index = ContextIndex::default();
        index.rebuild::<&str>(first.path(), &[]).unwrap();
        let stats = index.rebuild::<&str>(second.path(), &[]).unwrap();
        assert_eq!(stats.files_indexed, 1);
        assert_eq!(stats.files_removed, 0);
        assert!(index.symbols().files_declaring("handler_1").is_empty());
    }

    #[test]
    fn test_undecodable_file_is_recorded_without_symbols() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("blob.dat"), [0xC3u8, 0x28, 0xFF, 0xFE]).unwrap();
        let mut index = ContextIndex::default();
        let stats = index.rebuild::<&str>(dir.path(), &[]).unwrap();

        assert_eq!(stats.files_undecodable, 1);
        assert_eq!(stats.files_indexed, 0);
        let record = index.record(Path::new("blob.dat")).unwrap();
        assert_eq!(record.state, FileState::Undecodable);
        assert!(index.symbols().is_empty());
    }

    #[test]
    fn test_query_before_rebuild_is_not_indexed() {
        let index = ContextIndex::default();
        let bundle = index.find_relevant_context("anything");
        assert_eq!(
            bundle.outcome,
            crate::relevance::BundleOutcome::NotIndexed
        );
    }
}
