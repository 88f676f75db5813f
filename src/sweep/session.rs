use crate::sweep::audit::AuditLog;
use crate::sweep::config::SweepConfig;
use crate::sweep::driver::{self, DriverOptions, ItemEvent, StopReason};
use crate::sweep::ledger::Ledger;
use crate::sweep::paths::SweepPaths;
use crate::sweep::reconcile;
use crate::sweep::source::CaptureSource;
use crate::sweep::watcher::{self, WatcherOptions, WatcherStats};
use anyhow::{Context, Result, bail};
use chrono::Local;
use fs2::FileExt;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

pub const LOCK_FILE_NAME: &str = ".snapsweep.lock";

/// Everything one capture session produced, for rendering and for tests.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: String,
    pub started_at: String,
    pub out_dir: PathBuf,
    pub audit_log: PathBuf,
    pub stop: StopReason,
    pub stop_seq: Option<u64>,
    pub triggered: u64,
    pub skipped_failures: u64,
    pub skipped_timeouts: u64,
    pub first_repeat_seq: Option<u64>,
    pub observed: u64,
    pub distinct: u64,
    pub kept: u64,
    pub deleted: u64,
    pub delete_failures: u64,
    pub watcher: WatcherStats,
    pub events: Vec<ItemEvent>,
    pub reconcile_notes: Vec<String>,
    pub elapsed: Duration,
}

pub fn new_run_id() -> String {
    let now_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    format!("{now_ms:x}-{}", process::id())
}

/// Drive one full capture session against `source`: take the per-directory
/// lock, start the watcher over `out_dir`, run the acquisition loop, then
/// reconcile duplicates. Reconciliation runs even when the source was lost
/// mid-run, so whatever was captured is still deduplicated.
pub fn run_session<S: CaptureSource>(
    cfg: &SweepConfig,
    paths: &SweepPaths,
    out_dir: &Path,
    source: &mut S,
) -> Result<RunSummary> {
    let started = Instant::now();
    let started_at = Local::now().to_rfc3339();
    let run_id = new_run_id();

    fs::create_dir_all(out_dir).with_context(|| {
        format!("failed to create output directory {}", out_dir.display())
    })?;

    // One session per output directory. Two concurrent sessions would race
    // on sequence names and delete each other's artifacts.
    let lock_path = out_dir.join(LOCK_FILE_NAME);
    let lock_file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .open(&lock_path)
        .with_context(|| format!("failed to open session lock {}", lock_path.display()))?;
    if let Err(err) = lock_file.try_lock_exclusive() {
        bail!(
            "another snapsweep session holds {} ({err})",
            lock_path.display()
        );
    }

    let audit = AuditLog::new(&paths.logs_dir, &run_id);
    audit.append(
        "session",
        "start",
        &format!(
            "out_dir={} max_items={} repeat_threshold={}",
            out_dir.display(),
            cfg.session.max_items,
            cfg.detect.repeat_threshold
        ),
    );

    let ledger = Arc::new(Ledger::new());
    let handle = watcher::spawn(
        Arc::clone(&ledger),
        out_dir.to_path_buf(),
        WatcherOptions::from_config(&cfg.watcher),
    );

    let drive = driver::run_driver(source, &ledger, &DriverOptions::from_config(cfg), &audit);

    let mut watcher_stats: WatcherStats = handle.stop();
    // One last synchronous pass: an artifact that landed after its await
    // window timed out still belongs in the books before reconciliation.
    watcher_stats.absorb(watcher::scan_cycle(&ledger, out_dir, &cfg.watcher.extensions));

    let stats = ledger.stats();
    let swept = reconcile::reconcile(&ledger, &audit);

    let summary = RunSummary {
        run_id,
        started_at,
        out_dir: out_dir.to_path_buf(),
        audit_log: audit.log_path(),
        stop: drive.stop,
        stop_seq: drive.stop_seq,
        triggered: drive.triggered,
        skipped_failures: drive.skipped_failures,
        skipped_timeouts: drive.skipped_timeouts,
        first_repeat_seq: drive.first_repeat_seq,
        observed: stats.artifacts as u64,
        distinct: stats.distinct as u64,
        kept: swept.kept,
        deleted: swept.deleted,
        delete_failures: swept.failed,
        watcher: watcher_stats,
        events: drive.events,
        reconcile_notes: swept.notes,
        elapsed: started.elapsed(),
    };

    audit.append(
        "session",
        "finish",
        &format!(
            "stop_reason={} triggered={} observed={} distinct={} kept={} deleted={} delete_failures={}",
            summary.stop.as_str(),
            summary.triggered,
            summary.observed,
            summary.distinct,
            summary.kept,
            summary.deleted,
            summary.delete_failures
        ),
    );

    drop(lock_file);
    let _ = fs::remove_file(&lock_path);

    Ok(summary)
}
