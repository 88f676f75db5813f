include!(concat!(env!("OUT_DIR"), "/sweep_env_allowlist.rs"));

use anyhow::Result;

use crate::commands::CommandReport;
use crate::sweep::config;
use crate::sweep::paths::resolve_paths;

fn opt_or_unset(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("<unset>")
}

/// Report the effective configuration after defaults, config file, and
/// environment overrides have been applied, plus every `SWEEP_*` key the
/// binary reads.
pub fn run() -> Result<CommandReport> {
    let mut report = CommandReport::new("config");

    let paths = resolve_paths()?;
    let cfg = config::load_config()?;

    report.detail(format!("build_id={}", env!("BUILD_UUID")));
    report.detail(format!("sweep_home={}", paths.sweep_home.display()));
    report.detail(format!("logs_dir={}", paths.logs_dir.display()));

    match config::resolve_config_path() {
        Some(path) => {
            report.detail(format!("config_file={}", path.display()));
            report.detail(format!("config_file_exists={}", path.exists()));
        }
        None => report.detail("config_file=<unresolved>"),
    }

    report.detail(format!(
        "session.output_dir={}",
        opt_or_unset(&cfg.session.output_dir)
    ));
    report.detail(format!(
        "session.source_command={}",
        opt_or_unset(&cfg.session.source_command)
    ));
    report.detail(format!("session.max_items={}", cfg.session.max_items));
    report.detail(format!(
        "session.inter_action_delay_ms={}",
        cfg.session.inter_action_delay_ms
    ));
    report.detail(format!(
        "session.save_confirm_attempts={}",
        cfg.session.save_confirm_attempts
    ));
    report.detail(format!(
        "detect.repeat_threshold={}",
        cfg.detect.repeat_threshold
    ));
    report.detail(format!(
        "detect.appear_timeout_ms={}",
        cfg.detect.appear_timeout_ms
    ));
    report.detail(format!(
        "detect.poll_interval_ms={}",
        cfg.detect.poll_interval_ms
    ));
    report.detail(format!(
        "watcher.scan_interval_ms={}",
        cfg.watcher.scan_interval_ms
    ));
    report.detail(format!(
        "watcher.extensions={}",
        cfg.watcher.extensions.join(",")
    ));
    report.detail(format!(
        "env_allowlist={}",
        GENERATED_SWEEP_ENV_ALLOWLIST.join(",")
    ));

    Ok(report)
}
