//! Tree builder: batched concurrent reads, digest comparison, single-writer
//! fold into the index tables, and the end-of-pass purge/relink.

use super::tree::MerkleTree;
use super::{FileRecord, FileState, IndexState};
use crate::digest::{digest, Digest};
use crate::extract::{extract, Extracted};
use crate::resolve::Resolver;
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Result of reading one file, computed off the writer thread
enum ScanOutcome {
    Unreadable(String),
    TooLarge { size: u64 },
    Unchanged { digest: Digest, size: u64 },
    Changed {
        digest: Digest,
        size: u64,
        /// `None` when the bytes are not valid UTF-8
        extracted: Option<Extracted>,
    },
}

struct Scanned {
    relative: PathBuf,
    path: PathBuf,
    outcome: ScanOutcome,
}

/// What one traversal did, before it is turned into `IndexStats`
#[derive(Debug, Default)]
pub(crate) struct BuildOutcome {
    pub changed: Vec<PathBuf>,
    pub unreadable: usize,
    pub removed: usize,
    pub batches: usize,
}

pub(crate) struct TreeBuilder<'a> {
    root: &'a Path,
    batch_size: usize,
    max_file_bytes: u64,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(root: &'a Path, batch_size: usize, max_file_bytes: u64) -> Self {
        Self {
            root,
            batch_size: batch_size.max(1),
            max_file_bytes,
        }
    }

    /// Traverse `files` (root-relative, walk order) and bring `state` up to
    /// date. Per-file failures are absorbed; this never fails.
    pub fn build(&self, files: &[PathBuf], state: &mut IndexState) -> BuildOutcome {
        let enumerated: HashSet<PathBuf> = files.iter().map(|rel| self.root.join(rel)).collect();
        let resolver = Resolver::new(self.root, &enumerated);
        let previously_recorded: HashSet<PathBuf> = state.records.keys().cloned().collect();

        let mut outcome = BuildOutcome::default();
        let mut leaves: Vec<(PathBuf, Digest)> = Vec::with_capacity(files.len());
        let mut seen: HashSet<PathBuf> = HashSet::with_capacity(files.len());
        let mut ordinal = 0usize;

        for batch in files.chunks(self.batch_size) {
            // Fan out reads; the batch is fully collected before any table is touched.
            let scanned: Vec<Scanned> = {
                let prior = &state.records;
                batch.par_iter().map(|rel| self.scan(rel, prior)).collect()
            };
            outcome.batches += 1;

            for Scanned {
                relative,
                path,
                outcome: scan,
            } in scanned
            {
                let (leaf, mut record) = match scan {
                    ScanOutcome::Unreadable(reason) => {
                        debug!(path = %relative.display(), %reason, "skipping unreadable file");
                        outcome.unreadable += 1;
                        continue;
                    }
                    ScanOutcome::TooLarge { size } => {
                        let was_too_large = state
                            .records
                            .get(&path)
                            .is_some_and(|r| r.state == FileState::TooLarge);
                        if !was_too_large {
                            debug!(path = %relative.display(), size, "skipped: too large");
                            state.forget_content(&path);
                            outcome.changed.push(path.clone());
                        }
                        (
                            Digest::TOO_LARGE,
                            FileRecord::new(&path, &relative, Digest::TOO_LARGE, size, FileState::TooLarge),
                        )
                    }
                    ScanOutcome::Unchanged { digest, size } => {
                        let file_state = state
                            .records
                            .get(&path)
                            .map(|r| r.state)
                            .unwrap_or(FileState::Indexed);
                        (digest, FileRecord::new(&path, &relative, digest, size, file_state))
                    }
                    ScanOutcome::Changed {
                        digest,
                        size,
                        extracted,
                    } => {
                        outcome.changed.push(path.clone());
                        let file_state = match extracted {
                            Some(extracted) => {
                                state.index_content(&path, extracted, &resolver);
                                FileState::Indexed
                            }
                            None => {
                                debug!(path = %relative.display(), "content is not UTF-8; digest only");
                                state.forget_content(&path);
                                FileState::Undecodable
                            }
                        };
                        (digest, FileRecord::new(&path, &relative, digest, size, file_state))
                    }
                };

                record.ordinal = ordinal;
                ordinal += 1;

                leaves.push((relative, leaf));
                seen.insert(path.clone());
                state.records.insert(path, record);
            }
        }

        outcome.removed = state.purge_unseen(&seen);

        // A path that gained or lost its record (new, deleted, or unreadable
        // last pass) can turn an untouched file's import into an edge or a
        // dangling one.
        if seen != previously_recorded {
            let changed: HashSet<PathBuf> = outcome.changed.iter().cloned().collect();
            let relinked = state.relink(&resolver, |p| !changed.contains(p));
            debug!(relinked, "recorded file set changed; re-resolved imports");
        }
        state.prune_dangling_edges();

        state.tree = Some(MerkleTree::build(&leaves));

        outcome
    }

    fn scan(&self, relative: &Path, prior: &HashMap<PathBuf, FileRecord>) -> Scanned {
        let path = self.root.join(relative);
        let outcome = self.scan_path(&path, prior);
        Scanned {
            relative: relative.to_path_buf(),
            path,
            outcome,
        }
    }

    fn scan_path(&self, path: &Path, prior: &HashMap<PathBuf, FileRecord>) -> ScanOutcome {
        let meta = match fs::metadata(path) {
            Ok(m) if m.is_file() => m,
            Ok(_) => return ScanOutcome::Unreadable("not a regular file".to_string()),
            Err(e) => return ScanOutcome::Unreadable(e.to_string()),
        };

        if meta.len() > self.max_file_bytes {
            return ScanOutcome::TooLarge { size: meta.len() };
        }

        let bytes = match fs::read(path) {
            Ok(b) => b,
            Err(e) => return ScanOutcome::Unreadable(e.to_string()),
        };

        // The file may have grown between stat and read
        let size = bytes.len() as u64;
        if size > self.max_file_bytes {
            return ScanOutcome::TooLarge { size };
        }

        let digest = digest(&bytes);
        if prior.get(path).is_some_and(|r| r.digest == digest) {
            return ScanOutcome::Unchanged { digest, size };
        }

        let extracted = match String::from_utf8(bytes) {
            Ok(text) => Some(extract(path, &text)),
            Err(_) => None,
        };

        ScanOutcome::Changed {
            digest,
            size,
            extracted,
        }
    }
}
