use crate::sweep::config::WatcherConfig;
use crate::sweep::hasher;
use crate::sweep::ledger::{Ledger, UpsertOutcome};
use crate::sweep::util::now_epoch_secs;
use crate::sweep::warn::{self, WarnEvent};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

// Upper bound on how long a pending stop request waits on the inter-cycle
// sleep.
const STOP_CHECK_SLICE: Duration = Duration::from_millis(25);

#[derive(Debug, Clone)]
pub struct WatcherOptions {
    pub scan_interval: Duration,
    pub extensions: Vec<String>,
}

impl WatcherOptions {
    pub fn from_config(cfg: &WatcherConfig) -> Self {
        Self {
            scan_interval: Duration::from_millis(cfg.scan_interval_ms),
            extensions: cfg.extensions.clone(),
        }
    }
}

/// What one pass over the output directory did.
#[derive(Debug, Clone, Copy, Default)]
pub struct CycleStats {
    pub matched: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub collisions: usize,
}

/// Totals across every cycle of one watcher thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct WatcherStats {
    pub cycles: u64,
    pub updates: u64,
    pub skipped: u64,
    pub collisions: u64,
}

impl WatcherStats {
    pub fn absorb(&mut self, cycle: CycleStats) {
        self.cycles += 1;
        self.updates += cycle.updated as u64;
        self.skipped += cycle.skipped as u64;
        self.collisions += cycle.collisions as u64;
    }
}

pub struct WatcherHandle {
    stop: Arc<AtomicBool>,
    thread: JoinHandle<WatcherStats>,
}

impl WatcherHandle {
    /// Ask the loop to stop and wait for it. The flag is observed at the top
    /// of the next cycle (and inside the inter-cycle sleep), never mid-scan.
    pub fn stop(self) -> WatcherStats {
        self.stop.store(true, Ordering::Relaxed);
        match self.thread.join() {
            Ok(stats) => stats,
            Err(_) => {
                warn::emit(WarnEvent {
                    code: "WATCHER_PANICKED",
                    stage: "watcher",
                    action: "join",
                    item: "na",
                    path: "na",
                    retry: "none",
                    reason: "watcher-thread-panicked",
                    err: "na",
                });
                WatcherStats::default()
            }
        }
    }
}

/// Start the background watcher over `dir`. It rescans on `scan_interval`
/// until stopped, feeding every successfully hashed matching file into the
/// ledger.
pub fn spawn(ledger: Arc<Ledger>, dir: PathBuf, options: WatcherOptions) -> WatcherHandle {
    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);

    let thread = thread::spawn(move || {
        let mut stats = WatcherStats::default();
        while !flag.load(Ordering::Relaxed) {
            stats.absorb(scan_cycle(&ledger, &dir, &options.extensions));
            sleep_observing_stop(options.scan_interval, &flag);
        }
        stats
    });

    WatcherHandle { stop, thread }
}

fn sleep_observing_stop(total: Duration, stop: &AtomicBool) {
    let deadline = Instant::now() + total;
    loop {
        if stop.load(Ordering::Relaxed) {
            return;
        }
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        thread::sleep(STOP_CHECK_SLICE.min(deadline - now));
    }
}

/// Sequence number encoded in `file_name` if it follows the artifact naming
/// convention: an all-digit stem plus one recognized extension
/// (case-insensitive).
pub fn match_sequence(file_name: &str, extensions: &[String]) -> Option<u64> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let ext = ext.to_ascii_lowercase();
    if !extensions.iter().any(|known| *known == ext) {
        return None;
    }
    stem.parse::<u64>().ok()
}

/// One synchronous pass: list `dir`, hash every matching file, upsert into
/// the ledger. Hashing and listing happen outside the ledger lock. A file
/// that cannot be hashed this cycle (mid-write, transient I/O) is skipped
/// and picked up on a later pass; one bad file never aborts the rest. A
/// missing directory is an empty cycle, not an error.
pub fn scan_cycle(ledger: &Ledger, dir: &Path, extensions: &[String]) -> CycleStats {
    let mut stats = CycleStats::default();

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return stats,
        Err(err) => {
            warn::emit(WarnEvent {
                code: "SCAN_FAILED",
                stage: "watcher",
                action: "list-directory",
                item: "na",
                path: &dir.display().to_string(),
                retry: "retry-next-cycle",
                reason: "directory-unreadable",
                err: &err.to_string(),
            });
            return stats;
        }
    };

    let mut by_seq: BTreeMap<u64, Vec<PathBuf>> = BTreeMap::new();
    for entry in entries {
        let Ok(entry) = entry else {
            stats.skipped += 1;
            continue;
        };
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        let Some(seq) = match_sequence(name, extensions) else {
            continue;
        };
        by_seq.entry(seq).or_default().push(path);
    }

    for (seq, mut paths) in by_seq {
        stats.matched += paths.len();

        // Two recognized extensions for one sequence number: ambiguous.
        // Flag it and leave the ledger entry alone rather than guess which
        // file the source actually wrote.
        if paths.len() > 1 {
            paths.sort();
            stats.collisions += 1;
            warn::emit(WarnEvent {
                code: "EXTENSION_COLLISION",
                stage: "watcher",
                action: "match-artifact",
                item: &seq.to_string(),
                path: &paths
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(","),
                retry: "none",
                reason: "multiple-files-for-sequence",
                err: "na",
            });
            continue;
        }

        let path = &paths[0];
        match hasher::fingerprint(path) {
            Ok(Some(fingerprint)) => {
                let discovered = now_epoch_secs().unwrap_or(0);
                match ledger.upsert(seq, path, &fingerprint, discovered) {
                    UpsertOutcome::Unchanged => stats.unchanged += 1,
                    UpsertOutcome::Inserted | UpsertOutcome::Replaced => stats.updated += 1,
                }
            }
            // Disappeared between listing and hashing; next cycle decides.
            Ok(None) => stats.skipped += 1,
            Err(err) => {
                stats.skipped += 1;
                warn::emit(WarnEvent {
                    code: "HASH_FAILED",
                    stage: "watcher",
                    action: "fingerprint-artifact",
                    item: &seq.to_string(),
                    path: &path.display().to_string(),
                    retry: "retry-next-cycle",
                    reason: "artifact-unreadable",
                    err: &format!("{err:#}"),
                });
            }
        }
    }

    stats
}
