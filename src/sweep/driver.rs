use crate::sweep::audit::AuditLog;
use crate::sweep::config::SweepConfig;
use crate::sweep::ledger::{Ledger, Observation};
use crate::sweep::source::{CaptureSource, SourceError};
use crate::sweep::util::{FINGERPRINT_DISPLAY_CHARS, truncate_with_ellipsis};
use crate::sweep::warn::{self, WarnEvent};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct DriverOptions {
    pub max_items: u64,
    pub repeat_threshold: u64,
    pub appear_timeout: Duration,
    pub poll_interval: Duration,
    pub inter_action_delay: Duration,
    pub save_confirm_attempts: u64,
}

impl DriverOptions {
    pub fn from_config(cfg: &SweepConfig) -> Self {
        Self {
            max_items: cfg.session.max_items,
            repeat_threshold: cfg.detect.repeat_threshold,
            appear_timeout: Duration::from_millis(cfg.detect.appear_timeout_ms),
            poll_interval: Duration::from_millis(cfg.detect.poll_interval_ms),
            inter_action_delay: Duration::from_millis(cfg.session.inter_action_delay_ms),
            save_confirm_attempts: cfg.session.save_confirm_attempts,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A fingerprint reached the configured occurrence threshold.
    Threshold,
    /// The item cap was reached without hitting the threshold.
    Exhausted,
    /// The source could not advance any further; normal end of input.
    SourceEnded,
    /// The source became unreachable mid-run.
    SourceLost,
}

impl StopReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Threshold => "threshold",
            Self::Exhausted => "exhausted",
            Self::SourceEnded => "source-ended",
            Self::SourceLost => "source-lost",
        }
    }

    pub fn is_fatal(self) -> bool {
        matches!(self, Self::SourceLost)
    }
}

#[derive(Debug, Clone)]
pub struct ItemEvent {
    pub seq: u64,
    pub status: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct DriveOutcome {
    pub stop: StopReason,
    pub stop_seq: Option<u64>,
    pub triggered: u64,
    pub skipped_failures: u64,
    pub skipped_timeouts: u64,
    pub first_repeat_seq: Option<u64>,
    pub events: Vec<ItemEvent>,
}

impl DriveOutcome {
    fn new() -> Self {
        Self {
            stop: StopReason::Exhausted,
            stop_seq: None,
            triggered: 0,
            skipped_failures: 0,
            skipped_timeouts: 0,
            first_repeat_seq: None,
            events: Vec::new(),
        }
    }

    fn record(&mut self, seq: u64, status: &str, message: &str) {
        self.events.push(ItemEvent {
            seq,
            status: status.to_string(),
            message: message.to_string(),
        });
    }
}

#[derive(Debug)]
pub enum AwaitResult {
    Found(Observation),
    TimedOut,
}

/// Poll the ledger for the artifact of `seq` until it appears or `timeout`
/// elapses. Bounded sleep-and-retry, never a busy spin; always performs at
/// least one lookup.
pub fn await_artifact(
    ledger: &Ledger,
    seq: u64,
    timeout: Duration,
    poll_interval: Duration,
) -> AwaitResult {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(observation) = ledger.lookup(seq) {
            return AwaitResult::Found(observation);
        }
        let now = Instant::now();
        if now >= deadline {
            return AwaitResult::TimedOut;
        }
        thread::sleep(poll_interval.min(deadline - now));
    }
}

enum TriggerResult {
    Saved,
    Failed(String),
    Lost(String),
}

fn confirm_backoff(delay: Duration, attempt: u64) -> Duration {
    delay.saturating_mul(attempt.min(u32::MAX as u64) as u32)
}

/// One save trigger. Only `ConfirmationFailed` is retried: the save itself
/// has not happened yet, so re-confirming is safe. `ActionFailed` may have
/// half-happened and is never retried.
fn trigger_with_confirm_retry<S: CaptureSource>(
    source: &mut S,
    seq: u64,
    opts: &DriverOptions,
) -> TriggerResult {
    let name = seq.to_string();
    let mut attempt = 1u64;
    loop {
        match source.trigger_save(&name) {
            Ok(()) => return TriggerResult::Saved,
            Err(SourceError::ConfirmationFailed(detail)) => {
                if attempt >= opts.save_confirm_attempts {
                    return TriggerResult::Failed(format!(
                        "confirmation failed after {attempt} attempts: {detail}"
                    ));
                }
                warn::emit(WarnEvent {
                    code: "SAVE_CONFIRM_RETRY",
                    stage: "driver",
                    action: "trigger-save",
                    item: &name,
                    path: "na",
                    retry: &format!("attempt={}/{}", attempt + 1, opts.save_confirm_attempts),
                    reason: "confirmation-failed",
                    err: &detail,
                });
                thread::sleep(confirm_backoff(opts.inter_action_delay, attempt));
                attempt += 1;
            }
            Err(SourceError::ActionFailed(detail)) => return TriggerResult::Failed(detail),
            Err(SourceError::ConnectionLost(detail)) => return TriggerResult::Lost(detail),
        }
    }
}

/// Move the source along. `false` means the run is over and `out` already
/// carries the stop reason.
fn advance_or_stop<S: CaptureSource>(
    source: &mut S,
    out: &mut DriveOutcome,
    seq: u64,
    audit: &AuditLog,
) -> bool {
    match source.advance_next() {
        Ok(()) => true,
        Err(SourceError::ConnectionLost(detail)) => {
            out.record(seq, "source-lost", &detail);
            audit.append("driver", "stop", &format!("reason=source-lost seq={seq}"));
            out.stop = StopReason::SourceLost;
            out.stop_seq = Some(seq);
            false
        }
        // A finite source reports its end by refusing to advance.
        Err(err) => {
            let detail = err.to_string();
            out.record(seq, "source-ended", &detail);
            audit.append("driver", "stop", &format!("reason=source-ended seq={seq}"));
            out.stop = StopReason::SourceEnded;
            out.stop_seq = Some(seq);
            false
        }
    }
}

/// The sequential acquisition loop. For each sequence number: trigger a
/// save, wait for the watcher to observe the artifact, evaluate its
/// occurrence count against the repeat threshold, then advance the source.
/// Trigger and advance are irreversible external actions; a trigger is
/// never re-issued once the save may have happened.
pub fn run_driver<S: CaptureSource>(
    source: &mut S,
    ledger: &Ledger,
    opts: &DriverOptions,
    audit: &AuditLog,
) -> DriveOutcome {
    let mut out = DriveOutcome::new();

    for seq in 1..=opts.max_items {
        if seq > 1 && !opts.inter_action_delay.is_zero() {
            thread::sleep(opts.inter_action_delay);
        }

        match trigger_with_confirm_retry(source, seq, opts) {
            TriggerResult::Saved => out.triggered += 1,
            TriggerResult::Failed(detail) => {
                out.skipped_failures += 1;
                warn::emit(WarnEvent {
                    code: "SAVE_FAILED",
                    stage: "driver",
                    action: "trigger-save",
                    item: &seq.to_string(),
                    path: "na",
                    retry: "none",
                    reason: "save-failed",
                    err: &detail,
                });
                audit.append("driver", "skip", &format!("seq={seq} reason=save-failed"));
                out.record(seq, "save-failed", &detail);
                if !advance_or_stop(source, &mut out, seq, audit) {
                    return out;
                }
                continue;
            }
            TriggerResult::Lost(detail) => {
                out.record(seq, "source-lost", &detail);
                audit.append("driver", "stop", &format!("reason=source-lost seq={seq}"));
                out.stop = StopReason::SourceLost;
                out.stop_seq = Some(seq);
                return out;
            }
        }

        let observation =
            match await_artifact(ledger, seq, opts.appear_timeout, opts.poll_interval) {
                AwaitResult::Found(observation) => observation,
                AwaitResult::TimedOut => {
                    out.skipped_timeouts += 1;
                    let timeout_ms = opts.appear_timeout.as_millis();
                    warn::emit(WarnEvent {
                        code: "ARTIFACT_TIMEOUT",
                        stage: "driver",
                        action: "await-artifact",
                        item: &seq.to_string(),
                        path: "na",
                        retry: "none",
                        reason: "artifact-not-observed",
                        err: &format!("timeout_ms={timeout_ms}"),
                    });
                    audit.append(
                        "driver",
                        "skip",
                        &format!("seq={seq} reason=artifact-timeout timeout_ms={timeout_ms}"),
                    );
                    out.record(
                        seq,
                        "timeout",
                        &format!(
                            "no artifact within {timeout_ms}ms; it may have saved under an \
                             unrecognized extension or not at all"
                        ),
                    );
                    if !advance_or_stop(source, &mut out, seq, audit) {
                        return out;
                    }
                    continue;
                }
            };

        let short = truncate_with_ellipsis(&observation.fingerprint, FINGERPRINT_DISPLAY_CHARS);
        if observation.occurrences >= opts.repeat_threshold {
            out.record(
                seq,
                "threshold",
                &format!(
                    "fingerprint={short} occurrences={} threshold={}",
                    observation.occurrences, opts.repeat_threshold
                ),
            );
            audit.append(
                "driver",
                "stop",
                &format!(
                    "reason=threshold seq={seq} occurrences={} threshold={}",
                    observation.occurrences, opts.repeat_threshold
                ),
            );
            out.stop = StopReason::Threshold;
            out.stop_seq = Some(seq);
            return out;
        }

        if observation.occurrences >= 2 {
            // Repeated content below the threshold is flagged but not a
            // stop; a single repeat can be a duplicate frame in the source
            // itself.
            if out.first_repeat_seq.is_none() {
                out.first_repeat_seq = Some(seq);
            }
            warn::emit(WarnEvent {
                code: "REPEAT_DETECTED",
                stage: "driver",
                action: "evaluate-artifact",
                item: &seq.to_string(),
                path: "na",
                retry: "none",
                reason: "content-seen-before",
                err: "na",
            });
            audit.append(
                "driver",
                "repeat",
                &format!(
                    "seq={seq} fingerprint={short} occurrences={}",
                    observation.occurrences
                ),
            );
            out.record(
                seq,
                "repeat",
                &format!(
                    "fingerprint={short} occurrences={}",
                    observation.occurrences
                ),
            );
        } else {
            out.record(seq, "fresh", &format!("fingerprint={short} occurrences=1"));
        }

        if !advance_or_stop(source, &mut out, seq, audit) {
            return out;
        }
    }

    audit.append(
        "driver",
        "stop",
        &format!("reason=exhausted max_items={}", opts.max_items),
    );
    out
}
