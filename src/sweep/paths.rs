use anyhow::Result;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct SweepPaths {
    pub sweep_home: PathBuf,
    pub logs_dir: PathBuf,
}

fn required_home_dir() -> Result<PathBuf> {
    if let Some(home) = dirs::home_dir() {
        return Ok(home);
    }
    Err(anyhow::anyhow!("HOME directory could not be resolved"))
}

fn env_or_default_path(var: &str, fallback: PathBuf) -> PathBuf {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => fallback,
    }
}

pub fn resolve_paths() -> Result<SweepPaths> {
    let home = required_home_dir()?;
    let sweep_home = env_or_default_path("SWEEP_HOME", home.join(".snapsweep"));
    let logs_dir = env_or_default_path("SWEEP_LOGS_DIR", sweep_home.join("logs"));

    Ok(SweepPaths {
        sweep_home,
        logs_dir,
    })
}
