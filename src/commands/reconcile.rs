use anyhow::Result;
use std::path::PathBuf;

use crate::commands::CommandReport;
use crate::sweep::audit::AuditLog;
use crate::sweep::config;
use crate::sweep::ledger::Ledger;
use crate::sweep::paths::resolve_paths;
use crate::sweep::reconcile;
use crate::sweep::session;
use crate::sweep::watcher;

#[derive(Debug, Clone, Default)]
pub struct ReconcileOptions {
    pub out_dir: Option<String>,
}

/// Offline sweep over an existing capture directory: fingerprint every
/// artifact that follows the naming convention, then delete later
/// duplicates. Drives nothing; the directory is taken as-is.
pub fn run(opts: &ReconcileOptions) -> Result<CommandReport> {
    let mut report = CommandReport::new("reconcile");

    let mut cfg = config::load_config()?;
    if let Some(out_dir) = &opts.out_dir {
        cfg.session.output_dir = Some(out_dir.clone());
    }

    let Some(out_dir) = cfg.session.output_dir.clone() else {
        report.issue("missing output directory; pass --out-dir or set SWEEP_OUT_DIR");
        return Ok(report);
    };
    let out_dir = PathBuf::from(out_dir);
    if !out_dir.is_dir() {
        report.issue(format!(
            "output directory {} does not exist",
            out_dir.display()
        ));
        return Ok(report);
    }

    let paths = resolve_paths()?;
    let audit = AuditLog::new(&paths.logs_dir, &session::new_run_id());
    audit.append("reconcile", "start", &format!("out_dir={}", out_dir.display()));

    let ledger = Ledger::new();
    let cycle = watcher::scan_cycle(&ledger, &out_dir, &cfg.watcher.extensions);
    let stats = ledger.stats();
    let swept = reconcile::reconcile(&ledger, &audit);

    audit.append(
        "reconcile",
        "finish",
        &format!(
            "kept={} deleted={} failed={}",
            swept.kept, swept.deleted, swept.failed
        ),
    );

    report.detail(format!("run_id={}", audit.run_id()));
    report.detail(format!("out_dir={}", out_dir.display()));
    report.detail(format!("matched={}", cycle.matched));
    report.detail(format!("collisions={}", cycle.collisions));
    report.detail(format!("hash_skipped={}", cycle.skipped));
    report.detail(format!("observed={}", stats.artifacts));
    report.detail(format!("distinct={}", stats.distinct));
    report.detail(format!("kept={}", swept.kept));
    report.detail(format!("deleted={}", swept.deleted));
    report.detail(format!("delete_failures={}", swept.failed));
    report.detail(format!("audit_log={}", audit.log_path().display()));
    for note in &swept.notes {
        report.detail(format!("reconcile.note={note}"));
    }

    if swept.failed > 0 {
        report.issue(format!(
            "{} duplicate file(s) could not be deleted; see notes",
            swept.failed
        ));
    }

    Ok(report)
}
