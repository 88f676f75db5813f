use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub output_dir: Option<String>,
    pub source_command: Option<String>,
    pub max_items: u64,
    pub inter_action_delay_ms: u64,
    pub save_confirm_attempts: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            source_command: None,
            max_items: 1000,
            inter_action_delay_ms: 200,
            save_confirm_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectConfig {
    pub repeat_threshold: u64,
    pub appear_timeout_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for DetectConfig {
    fn default() -> Self {
        Self {
            repeat_threshold: 2,
            appear_timeout_ms: 10_000,
            poll_interval_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    pub scan_interval_ms: u64,
    pub extensions: Vec<String>,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            scan_interval_ms: 1000,
            extensions: vec!["jpg".to_string(), "jpeg".to_string(), "png".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SweepConfig {
    pub session: SessionConfig,
    pub detect: DetectConfig,
    pub watcher: WatcherConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialSweepConfig {
    session: Option<SessionConfig>,
    detect: Option<DetectConfig>,
    watcher: Option<WatcherConfig>,
}

fn env_or_u64(var: &str, fallback: u64) -> u64 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u64>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_opt_string(var: &str, fallback: Option<String>) -> Option<String> {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => fallback,
    }
}

fn env_or_csv(var: &str, fallback: &[String]) -> Vec<String> {
    match env::var(var) {
        Ok(v) => {
            let out = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToOwned::to_owned)
                .collect::<Vec<_>>();
            if out.is_empty() { fallback.to_vec() } else { out }
        }
        Err(_) => fallback.to_vec(),
    }
}

/// Lowercase, strip a leading dot, reject anything that is not plain ASCII
/// alphanumeric, and drop duplicates. Returns the normalized set in sorted
/// order.
fn normalize_extensions(raw: &[String]) -> Result<Vec<String>> {
    let mut out = BTreeSet::new();
    for entry in raw {
        let trimmed = entry.trim().trim_start_matches('.').to_ascii_lowercase();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(anyhow!(
                "invalid watcher extension `{entry}`: use plain alphanumeric extensions like jpg"
            ));
        }
        out.insert(trimmed);
    }
    Ok(out.into_iter().collect())
}

pub fn validate(cfg: &SweepConfig) -> Result<()> {
    if cfg.session.max_items == 0 {
        return Err(anyhow!("invalid max items: must be >= 1"));
    }
    if cfg.session.save_confirm_attempts == 0 {
        return Err(anyhow!("invalid save confirm attempts: must be >= 1"));
    }
    if cfg.detect.repeat_threshold < 2 {
        return Err(anyhow!("invalid repeat threshold: must be >= 2"));
    }
    if cfg.detect.appear_timeout_ms == 0 {
        return Err(anyhow!("invalid appear timeout: must be >= 1 ms"));
    }
    if cfg.detect.poll_interval_ms == 0 {
        return Err(anyhow!("invalid poll interval: must be >= 1 ms"));
    }
    if cfg.watcher.scan_interval_ms == 0 {
        return Err(anyhow!("invalid scan interval: must be >= 1 ms"));
    }
    if cfg.watcher.extensions.is_empty() {
        return Err(anyhow!("invalid watcher extensions: cannot be empty"));
    }
    Ok(())
}

pub fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(custom) = env::var("SWEEP_CONFIG_PATH") {
        let trimmed = custom.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }

    let paths = crate::sweep::paths::resolve_paths().ok()?;
    Some(paths.sweep_home.join("config.toml"))
}

fn merge_file_config(base: &mut SweepConfig) -> Result<()> {
    let Some(path) = resolve_config_path() else {
        return Ok(());
    };
    if !path.exists() {
        return Ok(());
    }

    let raw = fs::read_to_string(&path)?;
    let parsed: PartialSweepConfig = toml::from_str(&raw)
        .map_err(|err| anyhow!("failed to parse sweep config {}: {err}", path.display()))?;
    if let Some(session) = parsed.session {
        base.session = session;
    }
    if let Some(detect) = parsed.detect {
        base.detect = detect;
    }
    if let Some(watcher) = parsed.watcher {
        base.watcher = watcher;
    }
    Ok(())
}

pub fn load_config() -> Result<SweepConfig> {
    let mut cfg = SweepConfig::default();
    merge_file_config(&mut cfg)?;

    cfg.session.output_dir = env_or_opt_string("SWEEP_OUT_DIR", cfg.session.output_dir.take());
    cfg.session.source_command =
        env_or_opt_string("SWEEP_SOURCE_CMD", cfg.session.source_command.take());
    cfg.session.max_items = env_or_u64("SWEEP_MAX_ITEMS", cfg.session.max_items);
    cfg.session.inter_action_delay_ms = env_or_u64(
        "SWEEP_INTER_ACTION_DELAY_MS",
        cfg.session.inter_action_delay_ms,
    );
    cfg.session.save_confirm_attempts = env_or_u64(
        "SWEEP_SAVE_CONFIRM_ATTEMPTS",
        cfg.session.save_confirm_attempts,
    );
    cfg.detect.repeat_threshold =
        env_or_u64("SWEEP_REPEAT_THRESHOLD", cfg.detect.repeat_threshold);
    cfg.detect.appear_timeout_ms =
        env_or_u64("SWEEP_APPEAR_TIMEOUT_MS", cfg.detect.appear_timeout_ms);
    cfg.detect.poll_interval_ms =
        env_or_u64("SWEEP_POLL_INTERVAL_MS", cfg.detect.poll_interval_ms);
    cfg.watcher.scan_interval_ms =
        env_or_u64("SWEEP_SCAN_INTERVAL_MS", cfg.watcher.scan_interval_ms);
    cfg.watcher.extensions = env_or_csv("SWEEP_EXTENSIONS", &cfg.watcher.extensions);

    cfg.watcher.extensions = normalize_extensions(&cfg.watcher.extensions)?;
    validate(&cfg)?;
    Ok(cfg)
}
