//! Configuration for cairn

use crate::CairnError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Directory (under the workspace root) holding the optional config file
pub const CONFIG_DIR: &str = ".cairn";

/// Default configuration as TOML
pub const DEFAULT_CONFIG: &str = r#"# Cairn Configuration

[indexing]
# Files larger than this (bytes) are recorded as "skipped: too large"
max_file_bytes = 512000
# Number of files read concurrently per batch
batch_size = 64
# Also honour .gitignore files (exclusion globs below always apply)
respect_gitignore = false

[retrieval]
# Top-ranked files used as seeds for dependency expansion
seed_files = 3
# Hard cap on files returned for a single query
max_files = 8
# Score assigned when a query names a file explicitly
mention_score = 100.0
# Numerator of the per-symbol weight: symbol_weight / (declaring files + 1)
symbol_weight = 10.0

[ignore]
# Additional glob patterns to exclude (built-in exclusions always apply)
patterns = [
    "**/*.min.js",
    "**/*.min.css",
]

[watch]
# Coarse re-index timer for `cairn watch` (e.g., "30s", "5m", "1h")
interval = "30s"
# Caller-side cut-off for a single rebuild
rebuild_timeout = "2m"
"#;

/// Cairn configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub indexing: IndexingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub ignore: IgnoreConfig,
    #[serde(default)]
    pub watch: WatchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub respect_gitignore: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_seed_files")]
    pub seed_files: usize,
    #[serde(default = "default_max_files")]
    pub max_files: usize,
    #[serde(default = "default_mention_score")]
    pub mention_score: f64,
    #[serde(default = "default_symbol_weight")]
    pub symbol_weight: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IgnoreConfig {
    #[serde(default)]
    pub patterns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    #[serde(default = "default_interval")]
    pub interval: String,
    #[serde(default = "default_rebuild_timeout")]
    pub rebuild_timeout: String,
}

// Default value functions
fn default_max_file_bytes() -> u64 {
    500 * 1024
}
fn default_batch_size() -> usize {
    64
}
fn default_seed_files() -> usize {
    3
}
fn default_max_files() -> usize {
    8
}
fn default_mention_score() -> f64 {
    100.0
}
fn default_symbol_weight() -> f64 {
    10.0
}
fn default_interval() -> String {
    "30s".to_string()
}
fn default_rebuild_timeout() -> String {
    "2m".to_string()
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: default_max_file_bytes(),
            batch_size: default_batch_size(),
            respect_gitignore: false,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            seed_files: default_seed_files(),
            max_files: default_max_files(),
            mention_score: default_mention_score(),
            symbol_weight: default_symbol_weight(),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            rebuild_timeout: default_rebuild_timeout(),
        }
    }
}

impl Config {
    /// Path of the config file for a workspace
    pub fn path_for(workspace_root: &Path) -> PathBuf {
        workspace_root.join(CONFIG_DIR).join("config.toml")
    }

    /// Write `DEFAULT_CONFIG` into `<workspace>/.cairn/config.toml`
    pub fn init(workspace_root: &Path) -> crate::Result<PathBuf> {
        let config_path = Self::path_for(workspace_root);
        if config_path.exists() {
            return Err(CairnError::ConfigExists(config_path));
        }
        fs::create_dir_all(workspace_root.join(CONFIG_DIR))?;
        fs::write(&config_path, DEFAULT_CONFIG)?;
        Ok(config_path)
    }

    /// Load the workspace config, falling back to defaults when absent
    pub fn discover(workspace_root: &Path) -> crate::Result<Self> {
        let config_path = Self::path_for(workspace_root);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a TOML file
    pub fn load(path: &Path) -> crate::Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse config from TOML string
    pub fn from_toml(content: &str) -> crate::Result<Self> {
        toml::from_str(content).map_err(|e| CairnError::ConfigParse(e.to_string()))
    }

    /// Re-index timer for watch mode
    pub fn watch_interval(&self) -> crate::Result<Duration> {
        watch_duration("interval", &self.watch.interval)
    }

    /// Caller-side timeout for one rebuild
    pub fn rebuild_timeout(&self) -> crate::Result<Duration> {
        watch_duration("rebuild_timeout", &self.watch.rebuild_timeout)
    }
}

fn watch_duration(key: &str, value: &str) -> crate::Result<Duration> {
    parse_duration(value)
        .ok_or_else(|| CairnError::ConfigParse(format!("invalid [watch] {} '{}'", key, value)))
}

/// Parse a positive duration string (e.g., "1h", "30m", "1d").
/// Zero and out-of-range values are rejected.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    let (split, _) = s.char_indices().last()?;
    let (num_str, unit) = s.split_at(split);
    let num: u64 = num_str.parse().ok()?;
    if num == 0 {
        return None;
    }

    let seconds = match unit {
        "s" => Some(num),
        "m" => num.checked_mul(60),
        "h" => num.checked_mul(3600),
        "d" => num.checked_mul(86400),
        _ => None,
    }?;
    Some(Duration::from_secs(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_parses() {
        let config = Config::from_toml(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.indexing.max_file_bytes, 512_000);
        assert_eq!(config.indexing.batch_size, 64);
        assert_eq!(config.retrieval.seed_files, 3);
        assert_eq!(config.retrieval.max_files, 8);
        assert_eq!(config.ignore.patterns.len(), 2);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.indexing.max_file_bytes, 500 * 1024);
        assert!(!config.indexing.respect_gitignore);
        assert!(config.ignore.patterns.is_empty());
        assert_eq!(config.retrieval.mention_score, 100.0);
    }

    #[test]
    fn test_invalid_config_is_error() {
        let err = Config::from_toml("[indexing]\nbatch_size = \"many\"").unwrap_err();
        assert!(matches!(err, CairnError::ConfigParse(_)));
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("30s"), Some(Duration::from_secs(30)));
        assert_eq!(parse_duration("5m"), Some(Duration::from_secs(300)));
        assert_eq!(parse_duration("1h"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_duration("2d"), Some(Duration::from_secs(172800)));
        assert_eq!(parse_duration("invalid"), None);
    }

    #[test]
    fn test_parse_duration_rejects_zero_and_overflow() {
        assert_eq!(parse_duration("0s"), None);
        assert_eq!(parse_duration("0m"), None);
        assert_eq!(parse_duration(&format!("{}d", u64::MAX)), None);
        assert_eq!(parse_duration(&format!("{}m", u64::MAX / 60 + 1)), None);
        assert_eq!(parse_duration("5µ"), None);
        assert_eq!(
            parse_duration(&format!("{}s", u64::MAX)),
            Some(Duration::from_secs(u64::MAX))
        );
    }

    #[test]
    fn test_zero_watch_interval_is_config_error() {
        let config = Config::from_toml("[watch]\ninterval = \"0s\"").unwrap();
        assert!(matches!(
            config.watch_interval(),
            Err(CairnError::ConfigParse(_))
        ));
        assert_eq!(config.rebuild_timeout().unwrap(), Duration::from_secs(120));
    }

    #[test]
    fn test_init_then_discover() {
        let dir = TempDir::new().unwrap();
        let path = Config::init(dir.path()).unwrap();
        assert!(path.ends_with(".cairn/config.toml"));

        let config = Config::discover(dir.path()).unwrap();
        assert_eq!(config.watch_interval().unwrap(), Duration::from_secs(30));
        assert_eq!(config.rebuild_timeout().unwrap(), Duration::from_secs(120));

        assert!(matches!(
            Config::init(dir.path()),
            Err(CairnError::ConfigExists(_))
        ));
    }
}
