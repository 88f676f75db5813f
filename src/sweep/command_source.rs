use crate::sweep::source::{CaptureSource, SourceError};
use crate::sweep::util::truncate_with_ellipsis;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

// sysexits codes the source command uses to classify its own failures.
const EXIT_CONFIRM_RETRY: i32 = 75; // EX_TEMPFAIL: confirmation failed, safe to retry
const EXIT_SOURCE_GONE: i32 = 69; // EX_UNAVAILABLE: source unreachable, fatal

const STDERR_DETAIL_CHARS: usize = 160;

/// `CaptureSource` implemented by an external command, the process that
/// actually owns the UI automation. Protocol: `<cmd> save <name>` persists
/// the current item, `<cmd> advance` moves to the next one; exit code 0 is
/// success, 75 means "confirmation failed, retry me", 69 means "the source
/// is gone", anything else is a plain action failure. The command bounds its
/// own latency; no timeout is applied here.
#[derive(Debug, Clone)]
pub struct CommandSource {
    program: PathBuf,
}

impl CommandSource {
    /// Resolve `spec` to a runnable program: a bare name is looked up on
    /// PATH, anything with a path separator must exist as a file.
    pub fn resolve(spec: &str) -> Result<Self> {
        let trimmed = spec.trim();
        if trimmed.is_empty() {
            anyhow::bail!("source command cannot be empty");
        }

        let program = if trimmed.contains(std::path::MAIN_SEPARATOR) {
            let path = PathBuf::from(trimmed);
            ensure_command_path(&path)?;
            path
        } else {
            which::which(trimmed)
                .with_context(|| format!("source command `{trimmed}` not found on PATH"))?
        };

        Ok(Self { program })
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn invoke(&self, args: &[&str]) -> Result<(), SourceError> {
        let output = Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|err| {
                SourceError::ConnectionLost(format!(
                    "failed to spawn {} {}: {err}",
                    self.program.display(),
                    args.join(" ")
                ))
            })?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = truncate_with_ellipsis(
            String::from_utf8_lossy(&output.stderr).trim(),
            STDERR_DETAIL_CHARS,
        );
        let detail = |label: &str| {
            if stderr.is_empty() {
                format!("{} {} {label}", self.program.display(), args.join(" "))
            } else {
                format!(
                    "{} {} {label}: {stderr}",
                    self.program.display(),
                    args.join(" ")
                )
            }
        };

        match output.status.code() {
            Some(EXIT_CONFIRM_RETRY) => Err(SourceError::ConfirmationFailed(detail(
                "reported unconfirmed save",
            ))),
            Some(EXIT_SOURCE_GONE) => {
                Err(SourceError::ConnectionLost(detail("reported source gone")))
            }
            Some(code) => Err(SourceError::ActionFailed(detail(&format!(
                "exited with code {code}"
            )))),
            // Killed by a signal: the automation process itself died.
            None => Err(SourceError::ConnectionLost(detail("killed by signal"))),
        }
    }
}

impl CaptureSource for CommandSource {
    fn trigger_save(&mut self, proposed_name: &str) -> Result<(), SourceError> {
        self.invoke(&["save", proposed_name])
    }

    fn advance_next(&mut self) -> Result<(), SourceError> {
        self.invoke(&["advance"])
    }
}

fn ensure_command_path(path: &Path) -> Result<()> {
    let meta = fs::metadata(path)
        .with_context(|| format!("source command path does not exist: {}", path.display()))?;
    if !meta.is_file() {
        anyhow::bail!("source command path is not a file: {}", path.display());
    }
    Ok(())
}
