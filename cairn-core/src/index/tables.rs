//! Symbol and dependency tables: forward maps plus the reverse index that
//! lets a file's contributions be retracted exactly.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// symbol name (lowercased) -> declaring files, in insertion order
#[derive(Debug, Default, Clone)]
pub struct SymbolTable {
    by_name: HashMap<String, Vec<PathBuf>>,
    /// Reverse index: file -> names it contributed
    by_file: HashMap<PathBuf, HashSet<String>>,
}

impl SymbolTable {
    /// Files declaring `name`, oldest contribution first
    pub fn files_declaring(&self, name: &str) -> &[PathBuf] {
        self.by_name.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Names contributed by `path`
    pub fn symbols_of(&self, path: &Path) -> Option<&HashSet<String>> {
        self.by_file.get(path)
    }

    /// Number of distinct symbol names
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Replace everything `path` contributed with `names`
    pub(crate) fn replace_file(&mut self, path: &Path, names: &[String]) {
        self.remove_file(path);
        self.add_file(path, names);
    }

    /// Remove a file's entries using the reverse index (O(symbols in file))
    pub(crate) fn remove_file(&mut self, path: &Path) {
        if let Some(names) = self.by_file.remove(path) {
            for name in &names {
                if let Some(files) = self.by_name.get_mut(name) {
                    files.retain(|p| p != path);
                    if files.is_empty() {
                        self.by_name.remove(name);
                    }
                }
            }
        }
    }

    fn add_file(&mut self, path: &Path, names: &[String]) {
        if names.is_empty() {
            return;
        }
        let contributed = self.by_file.entry(path.to_path_buf()).or_default();
        for name in names {
            if contributed.insert(name.clone()) {
                self.by_name
                    .entry(name.clone())
                    .or_default()
                    .push(path.to_path_buf());
            }
        }
    }
}

/// file -> files it imports, in import order
#[derive(Debug, Default, Clone)]
pub struct DependencyTable {
    edges: HashMap<PathBuf, Vec<PathBuf>>,
}

impl DependencyTable {
    pub fn dependencies_of(&self, path: &Path) -> &[PathBuf] {
        self.edges.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total number of resolved edges
    pub fn edge_count(&self) -> usize {
        self.edges.values().map(Vec::len).sum()
    }

    /// Replace a file's entry wholesale
    pub(crate) fn set(&mut self, path: &Path, targets: Vec<PathBuf>) {
        if targets.is_empty() {
            self.edges.remove(path);
        } else {
            self.edges.insert(path.to_path_buf(), targets);
        }
    }

    pub(crate) fn remove(&mut self, path: &Path) {
        self.edges.remove(path);
    }

    /// Drop edges whose target fails `keep`
    pub(crate) fn retain_targets<F>(&mut self, keep: F)
    where
        F: Fn(&Path) -> bool,
    {
        self.edges.retain(|_, targets| {
            targets.retain(|t| keep(t.as_path()));
            !targets.is_empty()
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn symbol_table_tracks_ambiguous_names_in_insertion_order() {
        let mut table = SymbolTable::default();
        table.replace_file(Path::new("/w/b.rs"), &names(&["config", "loader"]));
        table.replace_file(Path::new("/w/a.rs"), &names(&["config"]));

        assert_eq!(
            table.files_declaring("config"),
            &[PathBuf::from("/w/b.rs"), PathBuf::from("/w/a.rs")]
        );
        assert_eq!(table.files_declaring("loader").len(), 1);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn replace_file_retracts_previous_contributions() {
        let mut table = SymbolTable::default();
        let path = Path::new("/w/a.rs");
        table.replace_file(path, &names(&["old_name", "shared"]));
        table.replace_file(Path::new("/w/b.rs"), &names(&["shared"]));
        table.replace_file(path, &names(&["new_name"]));

        assert!(table.files_declaring("old_name").is_empty());
        assert_eq!(table.files_declaring("shared"), &[PathBuf::from("/w/b.rs")]);
        assert_eq!(table.files_declaring("new_name"), &[PathBuf::from("/w/a.rs")]);
        assert_eq!(table.symbols_of(path).map(|s| s.len()), Some(1));
    }

    #[test]
    fn remove_file_clears_reverse_index() {
        let mut table = SymbolTable::default();
        let path = Path::new("/w/a.rs");
        table.replace_file(path, &names(&["alpha", "beta"]));
        table.remove_file(path);
        assert!(table.is_empty());
        assert!(table.symbols_of(path).is_none());
    }

    #[test]
    fn duplicate_names_in_one_file_count_once() {
        let mut table = SymbolTable::default();
        table.replace_file(Path::new("/w/a.rs"), &names(&["alpha", "alpha"]));
        assert_eq!(table.files_declaring("alpha").len(), 1);
    }

    #[test]
    fn dependency_table_replaces_and_prunes() {
        let mut deps = DependencyTable::default();
        let a = Path::new("/w/a.ts");
        deps.set(a, vec![PathBuf::from("/w/b.ts"), PathBuf::from("/w/c.ts")]);
        assert_eq!(deps.edge_count(), 2);

        deps.retain_targets(|t| t != Path::new("/w/b.ts"));
        assert_eq!(deps.dependencies_of(a), &[PathBuf::from("/w/c.ts")]);

        deps.set(a, Vec::new());
        assert!(deps.dependencies_of(a).is_empty());
        assert_eq!(deps.edge_count(), 0);
    }
}
