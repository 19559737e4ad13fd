//! Cairn CLI - Index a workspace and pull query-relevant context out of it

mod watch;

use cairn_core::{CairnError, Config, ContextIndex, IndexStats, SelectionReason};
use clap::{ArgAction, Parser, Subcommand};
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cairn")]
#[command(about = "Incremental codebase index for query-driven context retrieval", long_about = None)]
struct Cli {
    /// Override workspace root detection
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Extra exclusion glob (repeatable), e.g. --ignore '**/secrets/**'
    #[arg(long = "ignore", global = true, value_name = "GLOB")]
    ignore: Vec<String>,

    /// Increase log verbosity (-v info, -vv debug). CAIRN_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create .cairn/config.toml
    Init,

    /// Index the workspace and print statistics
    Index,

    /// Rank files against free text and print the context bundle
    Query {
        /// Query text (stack trace, error log, request); "-" reads stdin
        text: String,
    },

    /// Show what the index knows about one file
    Lookup {
        /// File path, absolute or relative to the workspace root
        path: PathBuf,
    },

    /// Re-index on a timer and answer queries read line by line from stdin
    Watch {
        /// Re-index interval (default from config), e.g. "30s", "5m"
        #[arg(long)]
        interval: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Init => cmd_init(cli.root),
        Commands::Index => cmd_index(cli.root, &cli.ignore, cli.json),
        Commands::Query { text } => cmd_query(cli.root, &cli.ignore, &text, cli.json),
        Commands::Lookup { path } => cmd_lookup(cli.root, &cli.ignore, &path, cli.json),
        Commands::Watch { interval } => {
            cmd_watch(cli.root, cli.ignore, interval.as_deref(), cli.json)
        }
    };

    if let Err(e) = result {
        if cli.json {
            let code = if e.is_traversal() { "traversal" } else { "error" };
            eprintln!(
                "{}",
                serde_json::json!({ "code": code, "message": e.to_string() })
            );
        } else {
            eprintln!("Error: {}", e);
        }
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("CAIRN_LOG").unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_init(root: Option<PathBuf>) -> cairn_core::Result<()> {
    use colored::Colorize;

    let workspace_root = detect_workspace_root(root)?;
    Config::init(&workspace_root)?;

    println!("{} .cairn/config.toml", "Created".green());
    Ok(())
}

fn cmd_index(root: Option<PathBuf>, ignore: &[String], json: bool) -> cairn_core::Result<()> {
    let (_, _, stats) = open_and_rebuild(root, ignore)?;

    if json {
        print_json(&stats);
    } else {
        print_stats(&stats);
    }
    Ok(())
}

fn cmd_query(
    root: Option<PathBuf>,
    ignore: &[String],
    text: &str,
    json: bool,
) -> cairn_core::Result<()> {
    use colored::Colorize;

    let query = if text == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        text.to_string()
    };

    let (_, index, _) = open_and_rebuild(root, ignore)?;
    let bundle = index.find_relevant_context(&query);

    if json {
        print_json(&bundle);
        return Ok(());
    }

    if !bundle.is_found() {
        eprintln!("{}", bundle.render().yellow());
        return Ok(());
    }

    for entry in &bundle.entries {
        eprintln!(
            "{} {} ({}, {:.2})",
            "Selected".green(),
            entry.display_name.bold(),
            reason_label(entry.reason),
            entry.score
        );
    }
    print!("{}", bundle.render());
    Ok(())
}

fn cmd_lookup(
    root: Option<PathBuf>,
    ignore: &[String],
    path: &Path,
    json: bool,
) -> cairn_core::Result<()> {
    use colored::Colorize;

    let (_, index, _) = open_and_rebuild(root, ignore)?;

    let Some(record) = index.record(path) else {
        if json {
            println!("{}", serde_json::json!({ "path": path, "indexed": false }));
        } else {
            println!("{} {} is not in the index", "Missing".yellow(), path.display());
        }
        return Ok(());
    };

    let mut symbols: Vec<&str> = index
        .symbols()
        .symbols_of(&record.path)
        .map(|names| names.iter().map(String::as_str).collect())
        .unwrap_or_default();
    symbols.sort_unstable();

    let root_dir = index.root().unwrap_or(Path::new(""));
    let dependencies: Vec<String> = index
        .dependencies()
        .dependencies_of(&record.path)
        .iter()
        .map(|p| p.strip_prefix(root_dir).unwrap_or(p).display().to_string())
        .collect();

    if json {
        println!(
            "{}",
            serde_json::json!({
                "record": record,
                "symbols": symbols,
                "dependencies": dependencies,
            })
        );
        return Ok(());
    }

    println!("{}", record.relative.display().to_string().bold());
    println!("  state:   {:?}", record.state);
    println!("  digest:  {}", record.digest.short());
    println!("  size:    {} bytes", record.size_bytes);
    println!("  symbols: {}", symbols.len());
    for name in &symbols {
        println!("    {}", name.cyan());
    }
    println!("  imports: {}", dependencies.len());
    for dep in &dependencies {
        println!("    {}", dep);
    }
    Ok(())
}

fn cmd_watch(
    root: Option<PathBuf>,
    ignore: Vec<String>,
    interval: Option<&str>,
    json: bool,
) -> cairn_core::Result<()> {
    let workspace_root = detect_workspace_root(root)?;
    let index = ContextIndex::for_workspace(&workspace_root)?;

    let mut settings = watch::WatchSettings::from_config(index.config())?;
    if let Some(raw) = interval {
        settings.interval = cairn_core::config::parse_duration(raw).ok_or_else(|| {
            CairnError::ConfigParse(format!("invalid --interval '{}' (expected e.g. 30s, 5m)", raw))
        })?;
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(watch::run(index, workspace_root, ignore, settings, json))
}

/// Detect the workspace root, load its config, and run one rebuild
fn open_and_rebuild(
    root: Option<PathBuf>,
    ignore: &[String],
) -> cairn_core::Result<(PathBuf, ContextIndex, IndexStats)> {
    let workspace_root = detect_workspace_root(root)?;
    let mut index = ContextIndex::for_workspace(&workspace_root)?;
    let stats = index.rebuild(&workspace_root, ignore)?;
    Ok((workspace_root, index, stats))
}

pub(crate) fn print_stats(stats: &IndexStats) {
    use colored::Colorize;

    println!(
        "{}: {} files in {} directories ({} changed, {} removed) in {}ms",
        "Indexed".green(),
        stats.files_indexed,
        stats.directories,
        stats.files_changed,
        stats.files_removed,
        stats.elapsed_ms
    );
    println!(
        "  {} symbols, {} dependency edges, root {}",
        stats.symbols,
        stats.dependency_edges,
        stats.root_digest.get(..12).unwrap_or(&stats.root_digest)
    );

    let skipped = stats.files_too_large + stats.files_undecodable + stats.files_unreadable;
    if skipped > 0 {
        println!(
            "  {}: {} too large, {} not UTF-8, {} unreadable",
            "Skipped".yellow(),
            stats.files_too_large,
            stats.files_undecodable,
            stats.files_unreadable
        );
    }
}

pub(crate) fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("Error: failed to encode JSON: {}", e),
    }
}

fn reason_label(reason: SelectionReason) -> &'static str {
    match reason {
        SelectionReason::Mentioned => "mentioned",
        SelectionReason::Symbol => "symbol match",
        SelectionReason::Dependency => "dependency",
    }
}

fn detect_workspace_root(override_path: Option<PathBuf>) -> cairn_core::Result<PathBuf> {
    if let Some(path) = override_path {
        return Ok(path);
    }

    // Walk up from current directory looking for .cairn or .git
    let mut current = std::env::current_dir()?;
    loop {
        if current.join(".cairn").exists() || current.join(".git").exists() {
            return Ok(current);
        }
        if !current.pop() {
            return Ok(std::env::current_dir()?);
        }
    }
}
