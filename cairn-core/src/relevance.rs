//! Query-driven file ranking and context bundle assembly.
//!
//! Explicit file mentions dominate, symbol overlap is weighted by how rare
//! the symbol is, and the top seeds pull in their direct dependencies.

use crate::config::RetrievalConfig;
use crate::extract::{is_identifier_char, tokenize};
use crate::index::{FileRecord, FileState, IndexState};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Whether a query produced anything
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BundleOutcome {
    /// At least one file was selected and read
    Found,
    /// The index was searched and nothing matched
    NoRelevantFiles,
    /// No rebuild has completed yet
    NotIndexed,
}

/// Why a file is in the bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionReason {
    Mentioned,
    Symbol,
    Dependency,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContextEntry {
    /// Workspace-relative path
    pub display_name: String,
    pub path: PathBuf,
    pub score: f64,
    pub reason: SelectionReason,
    pub content: String,
}

/// Ranked, count-bounded file contents answering one query
#[derive(Debug, Clone, Serialize)]
pub struct ContextBundle {
    pub outcome: BundleOutcome,
    pub entries: Vec<ContextEntry>,
}

impl ContextBundle {
    pub fn not_indexed() -> Self {
        Self {
            outcome: BundleOutcome::NotIndexed,
            entries: Vec::new(),
        }
    }

    pub fn no_relevant_files() -> Self {
        Self {
            outcome: BundleOutcome::NoRelevantFiles,
            entries: Vec::new(),
        }
    }

    pub fn is_found(&self) -> bool {
        self.outcome == BundleOutcome::Found
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Chosen files, in bundle order
    pub fn paths(&self) -> Vec<&Path> {
        self.entries.iter().map(|e| e.path.as_path()).collect()
    }

    /// Prompt-ready text: one `--- name ---` block per file
    pub fn render(&self) -> String {
        match self.outcome {
            BundleOutcome::NotIndexed => "Workspace has not been indexed yet.".to_string(),
            BundleOutcome::NoRelevantFiles => "No relevant files found.".to_string(),
            BundleOutcome::Found => {
                let mut out = String::new();
                for entry in &self.entries {
                    let _ = writeln!(out, "--- {} ---", entry.display_name);
                    out.push_str(&entry.content);
                    if !entry.content.ends_with('\n') {
                        out.push('\n');
                    }
                    out.push('\n');
                }
                out
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Score {
    mentioned: bool,
    total: f64,
}

/// Scores indexed files against a query. Borrows the index read-only.
pub(crate) struct RelevanceEngine<'a> {
    state: &'a IndexState,
    config: &'a RetrievalConfig,
}

impl<'a> RelevanceEngine<'a> {
    pub fn new(state: &'a IndexState, config: &'a RetrievalConfig) -> Self {
        Self {
            state,
            config,
        }
    }

    pub fn find(&self, query: &str) -> ContextBundle {
        let ranked = self.rank(query);
        if ranked.is_empty() {
            debug!("no file scored for query");
            return ContextBundle::no_relevant_files();
        }

        let seeds: Vec<(&FileRecord, Score)> = ranked
            .into_iter()
            .take(self.config.seed_files.max(1))
            .collect();

        // Seeds first, then each seed's direct dependencies in import order
        let mut candidates: Vec<(&Path, f64, SelectionReason)> = Vec::new();
        let mut queued: HashSet<&Path> = HashSet::new();
        for (record, score) in &seeds {
            let reason = if score.mentioned {
                SelectionReason::Mentioned
            } else {
                SelectionReason::Symbol
            };
            if queued.insert(record.path.as_path()) {
                candidates.push((record.path.as_path(), score.total, reason));
            }
        }
        for (record, _) in &seeds {
            for dep in self.state.dependencies.dependencies_of(&record.path) {
                if queued.insert(dep.as_path()) {
                    candidates.push((dep.as_path(), 0.0, SelectionReason::Dependency));
                }
            }
        }

        let mut entries = Vec::new();
        for (path, score, reason) in candidates {
            if entries.len() >= self.config.max_files {
                break;
            }
            let Some(record) = self.state.records.get(path) else {
                continue;
            };
            if record.state != FileState::Indexed {
                continue;
            }
            let content = match fs::read_to_string(path) {
                Ok(c) => c,
                Err(err) => {
                    debug!(path = %path.display(), error = %err, "file vanished before read");
                    continue;
                }
            };
            entries.push(ContextEntry {
                display_name: record.relative.to_string_lossy().to_string(),
                path: path.to_path_buf(),
                score,
                reason,
                content,
            });
        }

        if entries.is_empty() {
            return ContextBundle::no_relevant_files();
        }

        ContextBundle {
            outcome: BundleOutcome::Found,
            entries,
        }
    }

    /// Files with a positive score, best first. Ties keep walk order.
    fn rank(&self, query: &str) -> Vec<(&'a FileRecord, Score)> {
        let state: &'a IndexState = self.state;
        let mut scores: HashMap<&'a Path, Score> = HashMap::new();

        for record in state.records.values() {
            if record.state == FileState::Indexed && is_mentioned(query, record) {
                let score = scores.entry(record.path.as_path()).or_default();
                score.mentioned = true;
                score.total += self.config.mention_score;
            }
        }

        for token in tokenize(query) {
            let declaring = state.symbols.files_declaring(&token);
            if declaring.is_empty() {
                continue;
            }
            let weight = self.config.symbol_weight / (declaring.len() as f64 + 1.0);
            for path in declaring {
                scores.entry(path.as_path()).or_default().total += weight;
            }
        }

        let mut ranked: Vec<(&'a FileRecord, Score)> = scores
            .into_iter()
            .filter(|(_, s)| s.mentioned || s.total > 0.0)
            .filter_map(|(path, s)| state.records.get(path).map(|r| (r, s)))
            .filter(|(r, _)| r.state == FileState::Indexed)
            .collect();

        ranked.sort_by_key(|(r, _)| r.ordinal);
        ranked.sort_by(|(_, a), (_, b)| {
            b.mentioned
                .cmp(&a.mentioned)
                .then_with(|| b.total.total_cmp(&a.total))
        });

        for (record, score) in ranked.iter().take(self.config.seed_files) {
            debug!(
                path = %record.relative.display(),
                mentioned = score.mentioned,
                score = score.total,
                "seed"
            );
        }

        ranked
    }
}

/// The query names the file, by file name or by workspace-relative path
fn is_mentioned(query: &str, record: &FileRecord) -> bool {
    let file_name = record.relative.file_name().and_then(|n| n.to_str());
    if file_name.is_some_and(|name| mentions(query, name)) {
        return true;
    }
    let relative = record.relative.to_string_lossy();
    relative.contains('/') && mentions(query, &relative)
}

/// `needle` occurs in `haystack` with no identifier character glued to
/// either side (so `a.rs` is not mentioned by `data.rs`).
fn mentions(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    haystack.match_indices(needle).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + needle.len()..].chars().next();
        !before.is_some_and(is_identifier_char) && !after.is_some_and(is_identifier_char)
    })
}
