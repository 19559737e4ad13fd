//! Merkle tree over the workspace: leaves are file digests, each directory
//! digest folds its children's digests in walk order.

use crate::digest::{fold, Digest};
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

enum Child {
    Leaf(Digest),
    Dir(usize),
}

struct DirNode {
    path: PathBuf,
    children: Vec<Child>,
    subdirs: HashMap<OsString, usize>,
}

impl DirNode {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            children: Vec::new(),
            subdirs: HashMap::new(),
        }
    }
}

/// Directory digests for one traversal. Recomputed every rebuild.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    root: Digest,
    directories: HashMap<PathBuf, Digest>,
}

impl MerkleTree {
    /// Build from root-relative leaves in walk order
    pub fn build(leaves: &[(PathBuf, Digest)]) -> Self {
        let mut arena = vec![DirNode::new(PathBuf::new())];

        for (relative, leaf) in leaves {
            let mut current = 0usize;
            if let Some(parent) = relative.parent() {
                for component in parent.components() {
                    let name = component.as_os_str().to_os_string();
                    let existing = arena[current].subdirs.get(&name).copied();
                    current = match existing {
                        Some(idx) => idx,
                        None => {
                            let idx = arena.len();
                            let path = arena[current].path.join(&name);
                            arena.push(DirNode::new(path));
                            arena[current].subdirs.insert(name, idx);
                            arena[current].children.push(Child::Dir(idx));
                            idx
                        }
                    };
                }
            }
            arena[current].children.push(Child::Leaf(*leaf));
        }

        // Children are always allocated after their parent, so a reverse
        // sweep sees every subdirectory before the directory containing it.
        let mut digests: Vec<Option<Digest>> = vec![None; arena.len()];
        for idx in (0..arena.len()).rev() {
            let child_digests: Vec<Digest> = arena[idx]
                .children
                .iter()
                .filter_map(|child| match child {
                    Child::Leaf(d) => Some(*d),
                    Child::Dir(i) => digests[*i],
                })
                .collect();
            digests[idx] = Some(fold(&child_digests));
        }

        let directories: HashMap<PathBuf, Digest> = arena
            .into_iter()
            .zip(digests)
            .filter_map(|(node, digest)| digest.map(|d| (node.path, d)))
            .collect();

        let root = directories
            .get(Path::new(""))
            .copied()
            .unwrap_or_else(|| fold(&[]));

        Self {
            root,
            directories,
        }
    }

    /// Fingerprint of the whole workspace
    pub fn root_digest(&self) -> Digest {
        self.root
    }

    /// Digest of a root-relative directory (`""` is the root)
    pub fn directory_digest(&self, relative: &Path) -> Option<Digest> {
        self.directories.get(relative).copied()
    }

    /// Directories in the tree, the root included
    pub fn directory_count(&self) -> usize {
        self.directories.len()
    }
}
