/// One structured warning line on stderr. Values are collapsed to single
/// tokens so the output stays machine-splittable on whitespace.
#[derive(Debug, Clone, Copy)]
pub struct WarnEvent<'a> {
    pub code: &'a str,
    pub stage: &'a str,
    pub action: &'a str,
    pub item: &'a str,
    pub path: &'a str,
    pub retry: &'a str,
    pub reason: &'a str,
    pub err: &'a str,
}

fn sanitize_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut prev_sep = false;
    for ch in value.chars() {
        if ch.is_ascii_whitespace() {
            if !out.is_empty() && !prev_sep {
                out.push('_');
                prev_sep = true;
            }
        } else if ch.is_ascii_graphic() {
            out.push(ch);
            prev_sep = false;
        }
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "na".to_string()
    } else {
        trimmed.to_string()
    }
}

pub fn emit(event: WarnEvent<'_>) {
    eprintln!(
        "SWEEP_WARN code={} stage={} action={} item={} path={} retry={} reason={} err={}",
        sanitize_value(event.code),
        sanitize_value(event.stage),
        sanitize_value(event.action),
        sanitize_value(event.item),
        sanitize_value(event.path),
        sanitize_value(event.retry),
        sanitize_value(event.reason),
        sanitize_value(event.err),
    );
}
