use crate::sweep::audit::AuditLog;
use crate::sweep::ledger::Ledger;
use crate::sweep::util::{FINGERPRINT_DISPLAY_CHARS, truncate_with_ellipsis};
use crate::sweep::warn::{self, WarnEvent};
use std::collections::BTreeMap;
use std::fs;

#[derive(Debug, Clone, Default)]
pub struct ReconcileOutcome {
    pub kept: u64,
    pub deleted: u64,
    pub failed: u64,
    pub notes: Vec<String>,
}

/// Delete every artifact whose content was already seen at a lower sequence
/// number. Walks the ledger in ascending order, so the first occurrence of
/// each fingerprint survives regardless of when the watcher observed it.
/// Deletions that fail leave the ledger entry in place; every observed
/// artifact ends up in exactly one of kept, deleted, or failed.
pub fn reconcile(ledger: &Ledger, audit: &AuditLog) -> ReconcileOutcome {
    let mut out = ReconcileOutcome::default();
    let mut first_seen: BTreeMap<String, u64> = BTreeMap::new();

    for (seq, record) in ledger.snapshot() {
        let original = match first_seen.get(&record.fingerprint) {
            None => {
                first_seen.insert(record.fingerprint.clone(), seq);
                out.kept += 1;
                continue;
            }
            Some(original) => *original,
        };

        let shown = record.path.display().to_string();
        let short = truncate_with_ellipsis(&record.fingerprint, FINGERPRINT_DISPLAY_CHARS);
        match fs::remove_file(&record.path) {
            Ok(()) => {
                ledger.remove(seq);
                out.deleted += 1;
                audit.append(
                    "reconcile",
                    "delete",
                    &format!("seq={seq} duplicate_of={original} fingerprint={short}"),
                );
                out.notes
                    .push(format!("deleted seq={seq} path={shown} duplicate_of={original}"));
            }
            Err(err) => {
                out.failed += 1;
                warn::emit(WarnEvent {
                    code: "DELETE_FAILED",
                    stage: "reconcile",
                    action: "remove-duplicate",
                    item: &seq.to_string(),
                    path: &shown,
                    retry: "none",
                    reason: "remove-file-failed",
                    err: &err.to_string(),
                });
                audit.append(
                    "reconcile",
                    "delete-failed",
                    &format!("seq={seq} duplicate_of={original}"),
                );
                out.notes
                    .push(format!("delete failed seq={seq} path={shown}: {err}"));
            }
        }
    }

    out
}
