//! Workspace file discovery with built-in and user exclusion globs.

use crate::error::CairnError;
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Always excluded. Bare names match a file or directory of that name at any
/// depth; anything containing glob syntax is used as written.
pub const BUILTIN_IGNORES: &[&str] = &[
    // version control
    ".git",
    ".hg",
    ".svn",
    // dependency / vendor trees
    "node_modules",
    "bower_components",
    "vendor",
    ".venv",
    "venv",
    "__pycache__",
    ".tox",
    ".mypy_cache",
    ".pytest_cache",
    // build output
    "target",
    "dist",
    "build",
    "out",
    ".next",
    ".nuxt",
    ".gradle",
    "coverage",
    ".cache",
    ".cairn",
    // lock / log / binary files
    "*.lock",
    "package-lock.json",
    "*.log",
    "*.pyc",
    "*.class",
    "*.jar",
    "*.o",
    "*.a",
    "*.so",
    "*.dll",
    "*.dylib",
    "*.exe",
    "*.wasm",
    "*.png",
    "*.jpg",
    "*.jpeg",
    "*.gif",
    "*.ico",
    "*.pdf",
    "*.zip",
    "*.gz",
    "*.tar",
    "*.woff",
    "*.woff2",
    "*.ttf",
    "*.mp3",
    "*.mp4",
    ".DS_Store",
];

/// Compiled exclusion set (built-ins plus user patterns)
#[derive(Clone)]
pub struct IgnoreFilter {
    set: Arc<GlobSet>,
    respect_gitignore: bool,
}

impl IgnoreFilter {
    /// Compile built-ins plus `user_patterns`. A malformed user pattern is an
    /// error, not a silent no-op.
    pub fn new<S: AsRef<str>>(user_patterns: &[S], respect_gitignore: bool) -> crate::Result<Self> {
        let mut builder = GlobSetBuilder::new();

        let user = user_patterns
            .iter()
            .map(|p| p.as_ref().trim())
            .filter(|p| !p.is_empty());

        for pattern in BUILTIN_IGNORES.iter().copied().chain(user) {
            for glob_pattern in expand_pattern(pattern) {
                let glob = Glob::new(&glob_pattern).map_err(|e| CairnError::GlobPattern {
                    pattern: pattern.to_string(),
                    message: e.to_string(),
                })?;
                builder.add(glob);
            }
        }

        let set = builder.build().map_err(|e| CairnError::GlobPattern {
            pattern: "<set>".to_string(),
            message: e.to_string(),
        })?;

        Ok(Self {
            set: Arc::new(set),
            respect_gitignore,
        })
    }

    /// True if a workspace-relative path is excluded
    pub fn is_excluded(&self, relative: &Path) -> bool {
        self.set.is_match(relative)
    }

    /// Enumerate every regular file under `root` that survives the filter.
    ///
    /// Returns root-relative paths in walk order (sorted by file name within
    /// each directory). Excluded directories are pruned, not descended into.
    pub fn walk(&self, root: &Path) -> crate::Result<Vec<PathBuf>> {
        let meta = fs::metadata(root).map_err(|source| CairnError::RootInaccessible {
            path: root.to_path_buf(),
            source,
        })?;
        if !meta.is_dir() {
            return Err(CairnError::NotADirectory(root.to_path_buf()));
        }
        fs::read_dir(root).map_err(|source| CairnError::RootInaccessible {
            path: root.to_path_buf(),
            source,
        })?;

        let mut builder = WalkBuilder::new(root);
        builder.standard_filters(false);
        builder.hidden(false);
        builder.follow_links(false);
        if self.respect_gitignore {
            builder.git_ignore(true);
            builder.git_global(true);
            builder.git_exclude(true);
            builder.require_git(false);
        }
        builder.sort_by_file_name(|a, b| a.cmp(b));

        let prune = self.clone();
        let prune_root = root.to_path_buf();
        builder.filter_entry(move |entry| {
            if entry.depth() == 0 {
                return true;
            }
            let relative = entry.path().strip_prefix(&prune_root).unwrap_or(entry.path());
            !prune.is_excluded(relative)
        });

        let mut files = Vec::new();

        for entry in builder.build() {
            let entry = match entry {
                Ok(e) => e,
                Err(err) => {
                    debug!(error = %err, "skipping unreadable entry");
                    continue;
                }
            };

            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }

            let relative = match entry.path().strip_prefix(root) {
                Ok(r) => r,
                Err(_) => continue,
            };

            if self.is_excluded(relative) {
                continue;
            }

            files.push(relative.to_path_buf());
        }

        Ok(files)
    }
}

/// `name` -> `**/name` and `**/name/**`. Glob patterns pass through; one
/// ending in `/**` also matches the directory itself so the walk prunes it.
fn expand_pattern(pattern: &str) -> Vec<String> {
    let has_glob_syntax = pattern.contains(['*', '?', '[', '{']);
    if has_glob_syntax || pattern.contains('/') {
        let pattern = pattern.trim_start_matches("./");
        match pattern.strip_suffix("/**") {
            Some(dir) if !dir.is_empty() && dir != "**" => {
                vec![pattern.to_string(), dir.to_string()]
            }
            _ => vec![pattern.to_string()],
        }
    } else {
        vec![format!("**/{}", pattern), format!("**/{}/**", pattern)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "x").unwrap();
    }

    #[test]
    fn builtins_exclude_vcs_dependencies_and_binaries() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(root, "src/main.rs");
        touch(root, ".git/config");
        touch(root, "node_modules/react/index.js");
        touch(root, "web/node_modules/lodash/index.js");
        touch(root, "target/debug/app");
        touch(root, "Cargo.lock");
        touch(root, "logs/server.log");
        touch(root, "assets/logo.png");

        let filter = IgnoreFilter::new::<&str>(&[], false).unwrap();
        let files = filter.walk(root).unwrap();
        assert_eq!(files, vec![PathBuf::from("src/main.rs")]);
    }

    #[test]
    fn user_patterns_are_unioned_with_builtins() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(root, "src/lib.rs");
        touch(root, "config/secrets/key.pem");
        touch(root, "docs/notes.md");

        let filter = IgnoreFilter::new(&["**/secrets/**", "docs"], false).unwrap();
        let files = filter.walk(root).unwrap();
        assert_eq!(files, vec![PathBuf::from("src/lib.rs")]);
    }

    #[test]
    fn trailing_double_star_excludes_the_directory_itself() {
        assert_eq!(
            expand_pattern("**/secrets/**"),
            vec!["**/secrets/**".to_string(), "**/secrets".to_string()]
        );
        assert_eq!(expand_pattern("**"), vec!["**".to_string()]);

        let filter = IgnoreFilter::new(&["**/secrets/**"], false).unwrap();
        assert!(filter.is_excluded(Path::new("app/secrets")));
        assert!(filter.is_excluded(Path::new("app/secrets/key.pem")));
        assert!(!filter.is_excluded(Path::new("app/secrets_manager.rs")));
    }

    #[test]
    fn walk_order_is_sorted_and_stable() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(root, "b.py");
        touch(root, "a/z.py");
        touch(root, "a/c.py");

        let filter = IgnoreFilter::new::<&str>(&[], false).unwrap();
        let first = filter.walk(root).unwrap();
        let second = filter.walk(root).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            first,
            vec![
                PathBuf::from("a/c.py"),
                PathBuf::from("a/z.py"),
                PathBuf::from("b.py")
            ]
        );
    }

    #[test]
    fn gitignore_only_applies_when_enabled() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(root, "keep.rs");
        touch(root, "generated/out.rs");
        fs::write(root.join(".gitignore"), "generated/\n").unwrap();

        let plain = IgnoreFilter::new::<&str>(&[], false).unwrap();
        assert!(plain
            .walk(root)
            .unwrap()
            .contains(&PathBuf::from("generated/out.rs")));

        let git_aware = IgnoreFilter::new::<&str>(&[], true).unwrap();
        assert!(!git_aware
            .walk(root)
            .unwrap()
            .contains(&PathBuf::from("generated/out.rs")));
    }

    #[test]
    fn malformed_pattern_is_an_error() {
        let err = IgnoreFilter::new(&["src/[unclosed"], false).err().unwrap();
        assert!(matches!(err, CairnError::GlobPattern { .. }));
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = TempDir::new().unwrap();
        let filter = IgnoreFilter::new::<&str>(&[], false).unwrap();
        let err = filter.walk(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, CairnError::RootInaccessible { .. }));
    }
}
