use anyhow::Result;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Return the current Unix epoch in seconds.
///
/// This is the single, canonical implementation; do **not** duplicate
/// this helper in other modules.
pub fn now_epoch_secs() -> Result<u64> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs())
}

/// Display width for content fingerprints in audit lines, warnings, and
/// reconcile notes.
pub const FINGERPRINT_DISPLAY_CHARS: usize = 12;

/// Truncate `input` to at most `max_chars` Unicode characters, stripping
/// control characters and appending `…` when truncated.
pub fn truncate_with_ellipsis(input: &str, max_chars: usize) -> String {
    let clean: String = input.chars().filter(|c| !c.is_control()).collect();
    if clean.chars().count() > max_chars {
        let mut s: String = clean.chars().take(max_chars).collect();
        s.push('…');
        s
    } else {
        clean
    }
}

/// Render a wall-clock duration as `<minutes>m<seconds>s` for run summaries.
pub fn format_elapsed(elapsed: Duration) -> String {
    let total_secs = elapsed.as_secs_f64();
    let minutes = (total_secs / 60.0).floor() as u64;
    let seconds = total_secs - (minutes as f64) * 60.0;
    format!("{minutes}m{seconds:.2}s")
}
