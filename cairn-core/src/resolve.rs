//! Import resolution against the set of known workspace files.
//!
//! Best-effort and exact: a raw import only resolves when a candidate path is
//! literally present in the known set. Missing a real dependency is fine;
//! inventing one is not.

use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};
use tracing::trace;

/// Extensions appended to an import path, in order. The empty entry retries
/// the bare path.
pub const RESOLVE_EXTENSIONS: &[&str] = &[
    "", ".ts", ".tsx", ".js", ".jsx", ".mjs", ".cjs", ".vue", ".svelte", ".py", ".rs", ".go",
    ".java", ".kt", ".scala", ".c", ".h", ".cc", ".cpp", ".hpp", ".cs", ".rb", ".php",
    ".swift", ".dart", ".lua", ".ex", ".exs", ".css", ".scss",
];

/// Directory-index conventions tried when the import names a directory
pub const INDEX_FILES: &[&str] = &[
    "index.ts",
    "index.tsx",
    "index.js",
    "index.jsx",
    "index.mjs",
    "__init__.py",
    "mod.rs",
    "lib.rs",
    "index.php",
    "init.lua",
];

/// Maps raw import strings to indexed file paths
pub struct Resolver<'a> {
    root: &'a Path,
    known: &'a HashSet<PathBuf>,
}

impl<'a> Resolver<'a> {
    pub fn new(root: &'a Path, known: &'a HashSet<PathBuf>) -> Self {
        Self { root, known }
    }

    /// Resolve `raw` as imported from the file at `from` (absolute).
    ///
    /// Tries, first hit wins: the path relative to the importing file's
    /// directory, then with each extension appended, then each directory
    /// index file. Non-relative imports get the same three steps again
    /// relative to the workspace root.
    pub fn resolve(&self, from: &Path, raw: &str) -> Option<PathBuf> {
        let raw = raw.trim();
        if raw.is_empty() || raw.contains("://") {
            return None;
        }

        let from_dir = from.parent().unwrap_or(self.root);
        if let Some(hit) = self.try_base(&normalize(&from_dir.join(raw)), raw) {
            trace!(from = %from.display(), raw, resolved = %hit.display(), "import resolved");
            return Some(hit);
        }

        if !raw.starts_with('.') {
            let from_root = normalize(&self.root.join(raw.trim_start_matches('/')));
            if let Some(hit) = self.try_base(&from_root, raw) {
                trace!(from = %from.display(), raw, resolved = %hit.display(), "import resolved from root");
                return Some(hit);
            }
        }

        trace!(from = %from.display(), raw, "import unresolved");
        None
    }

    fn try_base(&self, base: &Path, raw: &str) -> Option<PathBuf> {
        // Never resolve outside the workspace
        if !base.starts_with(self.root) {
            return None;
        }

        if self.known.contains(base) {
            return Some(base.to_path_buf());
        }

        let names_directory = raw.ends_with('/') || raw == "." || raw == "..";
        if !names_directory {
            for ext in RESOLVE_EXTENSIONS {
                let candidate = with_suffix(base, ext);
                if self.known.contains(&candidate) {
                    return Some(candidate);
                }
            }
        }

        INDEX_FILES
            .iter()
            .map(|index| base.join(index))
            .find(|candidate| self.known.contains(candidate))
    }
}

/// Append a raw suffix to the final path component (`utils` + `.ts`)
fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut s: OsString = base.as_os_str().to_os_string();
    s.push(suffix);
    PathBuf::from(s)
}

/// Lexically remove `.` and `..` components without touching the filesystem
pub(crate) fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known(root: &Path, rels: &[&str]) -> HashSet<PathBuf> {
        rels.iter().map(|r| root.join(r)).collect()
    }

    #[test]
    fn resolves_direct_path() {
        let root = Path::new("/ws");
        let set = known(root, &["src/main.c", "src/util.h"]);
        let resolver = Resolver::new(root, &set);
        assert_eq!(
            resolver.resolve(&root.join("src/main.c"), "util.h"),
            Some(root.join("src/util.h"))
        );
    }

    #[test]
    fn resolves_by_appending_extension() {
        let root = Path::new("/ws");
        let set = known(root, &["src/app.ts", "src/utils.ts"]);
        let resolver = Resolver::new(root, &set);
        assert_eq!(
            resolver.resolve(&root.join("src/app.ts"), "./utils"),
            Some(root.join("src/utils.ts"))
        );
    }

    #[test]
    fn resolves_directory_index() {
        let root = Path::new("/ws");
        let set = known(
            root,
            &["web/app.js", "web/components/index.js", "py/pkg/__init__.py", "py/run.py"],
        );
        let resolver = Resolver::new(root, &set);
        assert_eq!(
            resolver.resolve(&root.join("web/app.js"), "./components"),
            Some(root.join("web/components/index.js"))
        );
        assert_eq!(
            resolver.resolve(&root.join("py/run.py"), "./pkg/"),
            Some(root.join("py/pkg/__init__.py"))
        );
    }

    #[test]
    fn resolves_parent_relative_and_rust_mod() {
        let root = Path::new("/ws");
        let set = known(root, &["src/lib.rs", "src/parser/mod.rs", "src/net/conn.rs"]);
        let resolver = Resolver::new(root, &set);
        assert_eq!(
            resolver.resolve(&root.join("src/lib.rs"), "parser"),
            Some(root.join("src/parser/mod.rs"))
        );
        assert_eq!(
            resolver.resolve(&root.join("src/net/conn.rs"), "../lib.rs"),
            Some(root.join("src/lib.rs"))
        );
    }

    #[test]
    fn falls_back_to_workspace_root_for_absolute_style_imports() {
        let root = Path::new("/ws");
        let set = known(root, &["app/models/user.py", "app/views/home.py"]);
        let resolver = Resolver::new(root, &set);
        assert_eq!(
            resolver.resolve(&root.join("app/views/home.py"), "app/models/user"),
            Some(root.join("app/models/user.py"))
        );
        // Relative imports never fall back to the root
        assert_eq!(
            resolver.resolve(&root.join("app/views/home.py"), "./app/models/user"),
            None
        );
    }

    #[test]
    fn external_packages_are_unresolved() {
        let root = Path::new("/ws");
        let set = known(root, &["src/index.ts"]);
        let resolver = Resolver::new(root, &set);
        assert_eq!(resolver.resolve(&root.join("src/index.ts"), "react"), None);
        assert_eq!(resolver.resolve(&root.join("src/index.ts"), "https://cdn/x.js"), None);
        assert_eq!(resolver.resolve(&root.join("src/index.ts"), "../../../etc/passwd"), None);
    }

    #[test]
    fn directory_import_does_not_match_sibling_file() {
        let root = Path::new("/ws");
        // `from . import x` inside pkg/ must not pick up ../pkg.py
        let set = known(root, &["pkg.py", "pkg/views.py"]);
        let resolver = Resolver::new(root, &set);
        assert_eq!(resolver.resolve(&root.join("pkg/views.py"), "./"), None);
    }

    #[test]
    fn resolution_is_idempotent() {
        let root = Path::new("/ws");
        let set = known(root, &["a/b.go", "a/c.go"]);
        let resolver = Resolver::new(root, &set);
        let first = resolver.resolve(&root.join("a/b.go"), "./c");
        let second = resolver.resolve(&root.join("a/b.go"), "./c");
        assert_eq!(first, second);
        assert_eq!(first, Some(root.join("a/c.go")));
    }

    #[test]
    fn normalize_collapses_dot_segments() {
        assert_eq!(normalize(Path::new("/a/b/../c/./d")), PathBuf::from("/a/c/d"));
    }
}
