//! Lexical symbol and import extraction.
//!
//! A deliberately shallow scanner: a handful of regexes cover declaration
//! keywords and import idioms across many languages. Nothing here parses;
//! a file that matches no pattern simply yields empty sets.

use regex::Regex;
use std::collections::HashSet;
use std::path::Path;
use std::sync::OnceLock;

/// Shortest identifier kept as a symbol or query token
pub const MIN_TOKEN_LEN: usize = 3;

/// Keywords and filler words that carry no retrieval signal
const STOP_WORDS: &[&str] = &[
    // declarations / control flow across languages
    "abstract", "async", "await", "break", "case", "catch", "class", "const", "continue",
    "def", "default", "defer", "del", "do", "elif", "else", "enum", "except", "export",
    "extends", "extern", "false", "final", "finally", "for", "from", "func", "function",
    "goto", "impl", "implements", "import", "include", "interface", "lambda", "let", "loop",
    "match", "mod", "module", "mut", "new", "nil", "none", "not", "null", "override",
    "package", "pass", "private", "protected", "pub", "public", "raise", "readonly", "ref",
    "require", "return", "self", "static", "struct", "super", "switch", "this", "throw",
    "throws", "trait", "true", "try", "type", "typedef", "undefined", "union", "unsafe",
    "use", "var", "virtual", "void", "where", "while", "with", "yield",
    // primitive type names
    "bool", "boolean", "byte", "char", "double", "float", "int", "long", "short", "str",
    "string", "u32", "u64", "i32", "i64", "usize", "isize", "f32", "f64", "vec", "option",
    "result", "any", "object", "number",
    // english filler common in logs and requests
    "the", "and", "but", "are", "was", "were", "has", "have", "had", "can", "could", "should",
    "would", "will", "this", "that", "these", "those", "what", "when", "why", "how", "which",
    "into", "onto", "about", "after", "before", "line", "file", "error", "errors", "failed",
    "fix", "please", "there", "here", "its", "our", "you", "your",
];

/// File stems too common to identify a file on their own
const GENERIC_BASENAMES: &[&str] = &[
    "index", "main", "app", "mod", "lib", "init", "__init__", "__main__", "setup", "test",
    "tests", "util", "common", "types",
];

fn stop_words() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| STOP_WORDS.iter().copied().collect())
}

/// `fn`, `class`, `struct`, ... followed by a name. The optional
/// parenthesised group skips Go method receivers.
fn declaration_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"\b(?:fn|func|function|def|defp|defmodule|class|struct|interface|enum|trait|type|typedef|union|protocol|record|object|module|namespace|macro_rules!)\s+(?:\([^)]*\)\s*)?([A-Za-z_$][A-Za-z0-9_$]*)",
        )
        .expect("declaration regex is valid")
    })
}

/// `const handler = async (req) => ...` and `let f = function ...`
fn binding_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"\b(?:const|let|var)\s+([A-Za-z_$][A-Za-z0-9_$]*)\s*=\s*(?:async\s+)?(?:function\b|\([^)]*\)\s*=>|[A-Za-z_$][A-Za-z0-9_$]*\s*=>)",
        )
        .expect("binding regex is valid")
    })
}

/// C-family definitions: `int parse_config(...) {`, `public void start() {`
fn c_like_definition_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?m)^[ \t]*(?:[A-Za-z_][A-Za-z0-9_<>,]*[ \t*&]+)+([A-Za-z_][A-Za-z0-9_]*)[ \t]*\([^;{]*\)[ \t]*(?:const[ \t]*)?(?:throws[^{;]*)?\{",
        )
        .expect("c-like definition regex is valid")
    })
}

/// Quoted module/path imports: `from "x"`, `require('x')`, `#include "x.h"`
fn quoted_import_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"\b(?:from|import|require|require_relative|require_once|include|include_once|load)\s*\(?\s*["']([^"'\n]+)["']"#,
        )
        .expect("quoted import regex is valid")
    })
}

/// Angle-bracket includes: `#include <x/y.h>`
fn angle_include_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"#\s*include\s*<([^>\n]+)>").expect("angle include regex is valid")
    })
}

/// Line-anchored `from a.b import c`, `import a.b`, and Rust `mod name;`
fn line_import_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?m)^[ \t]*(?:from[ \t]+(\.*[A-Za-z_][A-Za-z0-9_.]*|\.+)[ \t]+import\b|import[ \t]+([A-Za-z_][A-Za-z0-9_.]*)[ \t\r]*(?:;|,|as\b|$)|(?:pub(?:\([^)]*\))?[ \t]+)?mod[ \t]+([A-Za-z_][A-Za-z0-9_]*)[ \t]*;)",
        )
        .expect("line import regex is valid")
    })
}

/// Symbols and raw import strings found in one file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extracted {
    /// Lowercased declared names, first-occurrence order, no duplicates
    pub symbols: Vec<String>,
    /// Raw import strings as the resolver expects them (path-like)
    pub imports: Vec<String>,
}

/// Scan `content` for declarations and imports. `path` supplies the
/// implicit base-name symbol.
pub fn extract(path: &Path, content: &str) -> Extracted {
    let mut symbols = OrderedSet::default();

    if let Some(base) = base_symbol(path) {
        symbols.insert(base);
    }

    for re in [declaration_re(), binding_re(), c_like_definition_re()] {
        for caps in re.captures_iter(content) {
            if let Some(name) = caps.get(1) {
                if let Some(symbol) = normalize_symbol(name.as_str()) {
                    symbols.insert(symbol);
                }
            }
        }
    }

    Extracted {
        symbols: symbols.into_vec(),
        imports: extract_imports(content),
    }
}

/// Raw import strings in source order, without duplicates
pub fn extract_imports(content: &str) -> Vec<String> {
    // Collect with byte offsets so the three idioms interleave in source order
    let mut found: Vec<(usize, String)> = Vec::new();

    for re in [quoted_import_re(), angle_include_re()] {
        for caps in re.captures_iter(content) {
            if let Some(m) = caps.get(1) {
                let raw = m.as_str().trim();
                if !raw.is_empty() {
                    found.push((m.start(), raw.to_string()));
                }
            }
        }
    }

    for caps in line_import_re().captures_iter(content) {
        if let Some(m) = caps.get(1).or_else(|| caps.get(2)) {
            found.push((m.start(), module_to_path(m.as_str())));
        } else if let Some(m) = caps.get(3) {
            found.push((m.start(), m.as_str().to_string()));
        }
    }

    found.sort_by_key(|(offset, _)| *offset);

    let mut imports = OrderedSet::default();
    for (_, raw) in found {
        imports.insert(raw);
    }
    imports.into_vec()
}

/// Split free text into lowercased identifier tokens, dropping short and
/// stop-word tokens. Order of first appearance is kept.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = OrderedSet::default();
    for raw in text.split(|c: char| !is_identifier_char(c)) {
        if let Some(token) = normalize_symbol(raw) {
            tokens.insert(token);
        }
    }
    tokens.into_vec()
}

pub(crate) fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

pub fn is_stop_word(word: &str) -> bool {
    stop_words().contains(word)
}

/// Lowercase and filter a candidate identifier
fn normalize_symbol(raw: &str) -> Option<String> {
    let lower = raw.trim_matches('$').to_lowercase();
    if lower.chars().count() < MIN_TOKEN_LEN || is_stop_word(&lower) {
        return None;
    }
    if lower.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(lower)
}

/// The file name up to its first dot, unless it is too generic to help
fn base_symbol(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let stem = name.split('.').next().unwrap_or(name);
    let lower = stem.to_lowercase();
    if GENERIC_BASENAMES.contains(&lower.as_str()) {
        return None;
    }
    if !lower.chars().all(is_identifier_char) {
        return None;
    }
    normalize_symbol(&lower)
}

/// `a.b.c` -> `a/b/c`; leading dots become `./` and `../` segments
fn module_to_path(module: &str) -> String {
    let dots = module.chars().take_while(|c| *c == '.').count();
    let rest = module[dots..].replace('.', "/");
    match dots {
        0 => rest,
        1 => format!("./{}", rest),
        n => format!("{}{}", "../".repeat(n - 1), rest),
    }
}

/// Insertion-ordered set of strings
#[derive(Default)]
struct OrderedSet {
    seen: HashSet<String>,
    items: Vec<String>,
}

impl OrderedSet {
    fn insert(&mut self, item: String) {
        if self.seen.insert(item.clone()) {
            self.items.push(item);
        }
    }

    fn into_vec(self) -> Vec<String> {
        self.items
    }
}
