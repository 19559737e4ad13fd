//! Content indexing: folds extracted symbols and resolved imports into the
//! tables, and retracts them when a file changes, shrinks out or disappears.

use super::IndexState;
use crate::extract::Extracted;
use crate::resolve::Resolver;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::trace;

impl IndexState {
    /// Replace everything recorded for `path` with a fresh extraction
    pub(crate) fn index_content(&mut self, path: &Path, extracted: Extracted, resolver: &Resolver) {
        self.symbols.replace_file(path, &extracted.symbols);
        let targets = resolve_all(path, &extracted.imports, resolver);
        trace!(
            path = %path.display(),
            symbols = extracted.symbols.len(),
            imports = extracted.imports.len(),
            resolved = targets.len(),
            "indexed content"
        );
        self.dependencies.set(path, targets);
        self.raw_imports.insert(path.to_path_buf(), extracted.imports);
    }

    /// Drop symbol and dependency contributions but keep the file record
    pub(crate) fn forget_content(&mut self, path: &Path) {
        self.symbols.remove_file(path);
        self.dependencies.remove(path);
        self.raw_imports.remove(path);
    }

    /// Remove records (and contributions) for paths not observed this pass
    pub(crate) fn purge_unseen(&mut self, seen: &HashSet<PathBuf>) -> usize {
        let stale: Vec<PathBuf> = self
            .records
            .keys()
            .filter(|p| !seen.contains(*p))
            .cloned()
            .collect();

        for path in &stale {
            trace!(path = %path.display(), "purging stale record");
            self.records.remove(path);
            self.forget_content(path);
        }
        stale.len()
    }

    /// Re-resolve stored raw imports for every file accepted by `select`.
    /// Returns how many entries were recomputed.
    pub(crate) fn relink<F>(&mut self, resolver: &Resolver, select: F) -> usize
    where
        F: Fn(&Path) -> bool,
    {
        let mut relinked = 0usize;
        for (path, imports) in &self.raw_imports {
            if !select(path.as_path()) {
                continue;
            }
            let targets = resolve_all(path, imports, resolver);
            self.dependencies.set(path, targets);
            relinked += 1;
        }
        relinked
    }

    /// Drop edges whose target no longer has a record
    pub(crate) fn prune_dangling_edges(&mut self) {
        let records = &self.records;
        self.dependencies
            .retain_targets(|target| records.contains_key(target));
    }
}

/// Resolve raw imports in order, skipping self-edges and duplicates.
/// Unresolved imports are dropped.
fn resolve_all(path: &Path, imports: &[String], resolver: &Resolver) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    imports
        .iter()
        .filter_map(|raw| resolver.resolve(path, raw))
        .filter(|target| target != path && seen.insert(target.clone()))
        .collect()
}
