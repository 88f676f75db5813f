use anyhow::Result;
use std::path::PathBuf;

use crate::commands::CommandReport;
use crate::sweep::command_source::CommandSource;
use crate::sweep::config;
use crate::sweep::paths::resolve_paths;
use crate::sweep::session::{self, RunSummary};
use crate::sweep::util::format_elapsed;

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub out_dir: Option<String>,
    pub source_cmd: Option<String>,
    pub max_items: Option<u64>,
    pub repeat_threshold: Option<u64>,
    pub appear_timeout_ms: Option<u64>,
}

pub fn run(opts: &RunOptions) -> Result<CommandReport> {
    let mut report = CommandReport::new("run");

    let mut cfg = config::load_config()?;
    if let Some(out_dir) = &opts.out_dir {
        cfg.session.output_dir = Some(out_dir.clone());
    }
    if let Some(source_cmd) = &opts.source_cmd {
        cfg.session.source_command = Some(source_cmd.clone());
    }
    if let Some(max_items) = opts.max_items {
        cfg.session.max_items = max_items;
    }
    if let Some(threshold) = opts.repeat_threshold {
        cfg.detect.repeat_threshold = threshold;
    }
    if let Some(timeout_ms) = opts.appear_timeout_ms {
        cfg.detect.appear_timeout_ms = timeout_ms;
    }
    config::validate(&cfg)?;

    let Some(out_dir) = cfg.session.output_dir.clone() else {
        report.issue("missing output directory; pass --out-dir or set SWEEP_OUT_DIR");
        return Ok(report);
    };
    let Some(source_spec) = cfg.session.source_command.clone() else {
        report.issue("missing source command; pass --source-cmd or set SWEEP_SOURCE_CMD");
        return Ok(report);
    };

    let mut source = match CommandSource::resolve(&source_spec) {
        Ok(source) => source,
        Err(err) => {
            report.issue(format!("source command unusable: {err:#}"));
            return Ok(report);
        }
    };
    report.detail(format!("source_program={}", source.program().display()));

    let paths = resolve_paths()?;
    let out_dir = PathBuf::from(out_dir);
    let summary = session::run_session(&cfg, &paths, &out_dir, &mut source)?;
    render_summary(&mut report, &summary);

    Ok(report)
}

fn render_summary(report: &mut CommandReport, summary: &RunSummary) {
    report.detail(format!("run_id={}", summary.run_id));
    report.detail(format!("started_at={}", summary.started_at));
    report.detail(format!("out_dir={}", summary.out_dir.display()));
    report.detail(format!("stop_reason={}", summary.stop.as_str()));
    if let Some(seq) = summary.stop_seq {
        report.detail(format!("stop_seq={seq}"));
    }
    if let Some(seq) = summary.first_repeat_seq {
        report.detail(format!("first_repeat_seq={seq}"));
    }
    report.detail(format!("triggered={}", summary.triggered));
    report.detail(format!("skipped_failures={}", summary.skipped_failures));
    report.detail(format!("skipped_timeouts={}", summary.skipped_timeouts));
    report.detail(format!("observed={}", summary.observed));
    report.detail(format!("distinct={}", summary.distinct));
    report.detail(format!("kept={}", summary.kept));
    report.detail(format!("deleted={}", summary.deleted));
    report.detail(format!("delete_failures={}", summary.delete_failures));
    report.detail(format!("watcher.cycles={}", summary.watcher.cycles));
    report.detail(format!("watcher.updates={}", summary.watcher.updates));
    report.detail(format!("watcher.skipped={}", summary.watcher.skipped));
    report.detail(format!("watcher.collisions={}", summary.watcher.collisions));
    report.detail(format!("audit_log={}", summary.audit_log.display()));
    report.detail(format!("elapsed={}", format_elapsed(summary.elapsed)));

    for event in &summary.events {
        report.detail(format!(
            "item={} status={} message={}",
            event.seq, event.status, event.message
        ));
    }
    for note in &summary.reconcile_notes {
        report.detail(format!("reconcile.note={note}"));
    }

    if summary.stop.is_fatal() {
        report.issue("capture source lost mid-run; partial results were reconciled");
    }
}
