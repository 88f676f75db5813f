use crate::sweep::util::now_epoch_secs;
use crate::sweep::warn::{self, WarnEvent};
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub at_epoch_secs: u64,
    pub run_id: String,
    pub stage: String,
    pub status: String,
    pub message: String,
}

/// Append-only JSONL log of one run's notable decisions. Every line carries
/// the run id so interleaved runs stay attributable. Write failures degrade
/// to a `SWEEP_WARN` line: once the driver has performed irreversible
/// external actions, the run still owes the user its reconciliation and
/// summary, log or no log.
#[derive(Debug, Clone)]
pub struct AuditLog {
    logs_dir: PathBuf,
    run_id: String,
}

impl AuditLog {
    pub fn new(logs_dir: &Path, run_id: &str) -> Self {
        Self {
            logs_dir: logs_dir.to_path_buf(),
            run_id: run_id.to_string(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn log_path(&self) -> PathBuf {
        self.logs_dir.join("audit.log")
    }

    pub fn append(&self, stage: &str, status: &str, message: &str) {
        if let Err(err) = self.try_append(stage, status, message) {
            warn::emit(WarnEvent {
                code: "AUDIT_WRITE_FAILED",
                stage,
                action: "append-audit-line",
                item: &self.run_id,
                path: &self.log_path().display().to_string(),
                retry: "none",
                reason: "audit-io-failed",
                err: &format!("{err:#}"),
            });
        }
    }

    fn try_append(&self, stage: &str, status: &str, message: &str) -> Result<()> {
        fs::create_dir_all(&self.logs_dir)
            .with_context(|| format!("failed to create {}", self.logs_dir.display()))?;
        let event = AuditEvent {
            at_epoch_secs: now_epoch_secs()?,
            run_id: self.run_id.clone(),
            stage: stage.to_string(),
            status: status.to_string(),
            message: message.to_string(),
        };

        let line = format!("{}\n", serde_json::to_string(&event)?);
        use std::io::Write;
        let path = self.log_path();
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}
