//! `cairn watch`: periodic rebuilds plus an interactive query loop.
//!
//! The index lives behind one mutex. Rebuilds run on the blocking pool and
//! are awaited as their own `select!` branch, so stdin and Ctrl-C stay live
//! while one is in flight. A rebuild past `rebuild_timeout` is reported and
//! left to finish; ticks are skipped until it does. Queries never wait on the
//! lock: while a rebuild holds it they are answered with a busy notice.

use crate::{print_json, print_stats};
use cairn_core::{Config, ContextBundle, ContextIndex, IndexStats};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, TryLockError};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{interval, sleep, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

type SharedIndex = Arc<Mutex<ContextIndex>>;
type RebuildTask = JoinHandle<cairn_core::Result<IndexStats>>;

#[derive(Debug)]
pub struct WatchSettings {
    pub interval: Duration,
    pub rebuild_timeout: Duration,
}

impl WatchSettings {
    pub fn from_config(config: &Config) -> cairn_core::Result<Self> {
        Ok(Self {
            interval: config.watch_interval()?,
            rebuild_timeout: config.rebuild_timeout()?,
        })
    }
}

pub async fn run(
    index: ContextIndex,
    root: PathBuf,
    ignore: Vec<String>,
    settings: WatchSettings,
    json: bool,
) -> cairn_core::Result<()> {
    use colored::Colorize;

    let index: SharedIndex = Arc::new(Mutex::new(index));
    let ignore = Arc::new(ignore);

    eprintln!(
        "{} {} every {:?} (type a query and press enter, Ctrl-C to stop)",
        "Watching".green(),
        root.display(),
        settings.interval
    );

    let mut ticker = interval(settings.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    let mut in_flight: Option<RebuildTask> = None;
    let deadline = sleep(settings.rebuild_timeout);
    tokio::pin!(deadline);
    let mut deadline_armed = false;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if in_flight.is_some() {
                    debug!("previous rebuild still running; skipping tick");
                    continue;
                }
                in_flight = Some(spawn_rebuild(&index, &root, &ignore));
                deadline.as_mut().reset(Instant::now() + settings.rebuild_timeout);
                deadline_armed = true;
            }
            joined = join_rebuild(&mut in_flight), if in_flight.is_some() => {
                in_flight = None;
                deadline_armed = false;
                match joined {
                    Ok(Ok(stats)) => report(&stats, json),
                    Ok(Err(e)) => {
                        // Previous index stays queryable
                        warn!(error = %e, "rebuild failed");
                        eprintln!("{} {}", "Rebuild failed:".red(), e);
                    }
                    Err(join_error) => {
                        warn!(error = %join_error, "rebuild task panicked");
                    }
                }
            }
            () = &mut deadline, if deadline_armed => {
                deadline_armed = false;
                warn!(timeout = ?settings.rebuild_timeout, "rebuild timed out");
                eprintln!(
                    "{} rebuild exceeded {:?}; it keeps running and queries are refused until it completes",
                    "Timeout:".yellow(),
                    settings.rebuild_timeout
                );
            }
            line = lines.next_line(), if stdin_open => {
                match line {
                    Ok(Some(query)) => {
                        let query = query.trim();
                        if !query.is_empty() {
                            let answered = tokio::task::block_in_place(|| try_answer(&index, query));
                            match answered {
                                Some(bundle) if json => print_json(&bundle),
                                Some(bundle) => print!("{}", bundle.render()),
                                None => eprintln!(
                                    "{} rebuild in progress; try the query again shortly",
                                    "Busy:".yellow()
                                ),
                            }
                        }
                    }
                    Ok(None) => {
                        debug!("stdin closed; continuing with timed rebuilds only");
                        stdin_open = false;
                    }
                    Err(e) => {
                        warn!(error = %e, "failed to read stdin");
                        stdin_open = false;
                    }
                }
            }
            _ = &mut shutdown => {
                info!("interrupted");
                break;
            }
        }
    }

    Ok(())
}

fn spawn_rebuild(index: &SharedIndex, root: &Path, ignore: &Arc<Vec<String>>) -> RebuildTask {
    let index = Arc::clone(index);
    let root = root.to_path_buf();
    let ignore = Arc::clone(ignore);
    tokio::task::spawn_blocking(move || {
        let mut guard = index.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.rebuild(&root, ignore.as_slice())
    })
}

/// Await the in-flight rebuild; pends forever when there is none
async fn join_rebuild(
    task: &mut Option<RebuildTask>,
) -> Result<cairn_core::Result<IndexStats>, JoinError> {
    match task.as_mut() {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

/// Answer from the current index, or `None` while a rebuild holds it
fn try_answer(index: &SharedIndex, query: &str) -> Option<ContextBundle> {
    let guard = match index.try_lock() {
        Ok(guard) => guard,
        Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        Err(TryLockError::WouldBlock) => return None,
    };
    Some(guard.find_relevant_context(query))
}

fn report(stats: &IndexStats, json: bool) {
    if json {
        print_json(stats);
    } else {
        print_stats(stats);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_core::BundleOutcome;

    #[test]
    fn query_is_refused_while_index_is_locked() {
        let index: SharedIndex = Arc::new(Mutex::new(ContextIndex::default()));

        let guard = index.lock().unwrap();
        assert!(try_answer(&index, "parseConfig").is_none());
        drop(guard);

        let bundle = try_answer(&index, "parseConfig").unwrap();
        assert_eq!(bundle.outcome, BundleOutcome::NotIndexed);
    }

    #[test]
    fn zero_interval_in_config_is_rejected() {
        let config = Config::from_toml("[watch]\ninterval = \"0s\"").unwrap();
        assert!(WatchSettings::from_config(&config).is_err());

        let settings = WatchSettings::from_config(&Config::default()).unwrap();
        assert_eq!(settings.interval, Duration::from_secs(30));
        assert_eq!(settings.rebuild_timeout, Duration::from_secs(120));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn pending_join_does_not_resolve_without_a_task() {
        let mut none: Option<RebuildTask> = None;
        let waited =
            tokio::time::timeout(Duration::from_millis(20), join_rebuild(&mut none)).await;
        assert!(waited.is_err());
    }
}
