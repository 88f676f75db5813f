use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// One observed artifact: the file a single save trigger produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRecord {
    pub path: PathBuf,
    pub fingerprint: String,
    pub discovered_at_epoch_secs: u64,
}

/// Consistent read of one artifact and how often its fingerprint currently
/// occurs across the whole ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub fingerprint: String,
    pub occurrences: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Replaced,
    Unchanged,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerStats {
    pub artifacts: usize,
    pub distinct: usize,
    pub count_sum: u64,
}

#[derive(Debug, Default)]
struct LedgerInner {
    artifacts: BTreeMap<u64, ArtifactRecord>,
    counts: BTreeMap<String, u64>,
}

/// Shared index of sequence number → artifact record plus fingerprint →
/// occurrence count. Both maps live under one mutex and are only ever
/// updated together, so readers never observe a half-applied overwrite.
/// Owned by a single capture session; the directory watcher is the sole
/// writer while the acquisition loop runs.
#[derive(Debug, Default)]
pub struct Ledger {
    inner: Mutex<LedgerInner>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, LedgerInner> {
        // The critical sections hold no I/O and cannot leave the maps
        // inconsistent, so a poisoned lock is still safe to reuse.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record (or re-record) the artifact for `seq`. A changed fingerprint
    /// decrements the old occurrence count (dropping zero entries) and
    /// increments the new one in the same critical section; re-upserting an
    /// identical fingerprint changes no count. The stored path always
    /// follows the latest observation.
    pub fn upsert(
        &self,
        seq: u64,
        path: &Path,
        fingerprint: &str,
        discovered_at_epoch_secs: u64,
    ) -> UpsertOutcome {
        let mut guard = self.lock();
        let inner = &mut *guard;

        match inner.artifacts.get_mut(&seq) {
            Some(record) if record.fingerprint == fingerprint => {
                if record.path != path {
                    record.path = path.to_path_buf();
                }
                UpsertOutcome::Unchanged
            }
            // Overwrite in place: the record keeps its original discovery
            // time, only the content (and possibly the path) moved on.
            Some(record) => {
                let old = std::mem::replace(&mut record.fingerprint, fingerprint.to_string());
                record.path = path.to_path_buf();
                decrement(&mut inner.counts, &old);
                *inner.counts.entry(fingerprint.to_string()).or_insert(0) += 1;
                UpsertOutcome::Replaced
            }
            None => {
                inner.artifacts.insert(
                    seq,
                    ArtifactRecord {
                        path: path.to_path_buf(),
                        fingerprint: fingerprint.to_string(),
                        discovered_at_epoch_secs,
                    },
                );
                *inner.counts.entry(fingerprint.to_string()).or_insert(0) += 1;
                UpsertOutcome::Inserted
            }
        }
    }

    /// Atomic read of the artifact's fingerprint and that fingerprint's
    /// current occurrence count, both as of one instant.
    pub fn lookup(&self, seq: u64) -> Option<Observation> {
        let inner = self.lock();
        let record = inner.artifacts.get(&seq)?;
        let occurrences = inner.counts.get(&record.fingerprint).copied().unwrap_or(0);
        Some(Observation {
            fingerprint: record.fingerprint.clone(),
            occurrences,
        })
    }

    /// Drop the artifact for `seq`, adjusting the occurrence count like a
    /// replace with nothing. Used only by reconciliation, after the watcher
    /// has stopped.
    pub fn remove(&self, seq: u64) -> Option<ArtifactRecord> {
        let mut inner = self.lock();
        let record = inner.artifacts.remove(&seq)?;
        decrement(&mut inner.counts, &record.fingerprint);
        Some(record)
    }

    /// All artifacts in ascending sequence order.
    pub fn snapshot(&self) -> Vec<(u64, ArtifactRecord)> {
        let inner = self.lock();
        inner
            .artifacts
            .iter()
            .map(|(seq, record)| (*seq, record.clone()))
            .collect()
    }

    /// Both maps summarized in one critical section, so the sum invariant
    /// (Σ counts == artifacts) is checkable at an observable instant.
    pub fn stats(&self) -> LedgerStats {
        let inner = self.lock();
        LedgerStats {
            artifacts: inner.artifacts.len(),
            distinct: inner.counts.len(),
            count_sum: inner.counts.values().sum(),
        }
    }
}

fn decrement(counts: &mut BTreeMap<String, u64>, fingerprint: &str) {
    let Some(count) = counts.get_mut(fingerprint) else {
        return;
    };
    *count = count.saturating_sub(1);
    if *count == 0 {
        counts.remove(fingerprint);
    }
}

#[cfg(test)]
mod tests {
    use super::{Ledger, UpsertOutcome};
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::thread;

    fn path(name: &str) -> PathBuf {
        PathBuf::from(format!("/out/{name}"))
    }

    #[test]
    fn counts_always_sum_to_artifact_count() {
        let ledger = Ledger::new();
        let fingerprints = ["aa", "bb", "aa", "cc", "bb", "aa", "bb"];
        for (i, fp) in fingerprints.iter().enumerate() {
            let seq = (i % 4) as u64 + 1;
            ledger.upsert(seq, &path(&format!("{seq}.jpg")), fp, 10 + i as u64);
            let stats = ledger.stats();
            assert_eq!(stats.count_sum, stats.artifacts as u64);
        }
    }

    #[test]
    fn reupserting_the_same_pair_changes_nothing() {
        let ledger = Ledger::new();
        assert_eq!(
            ledger.upsert(1, &path("1.jpg"), "aa", 10),
            UpsertOutcome::Inserted
        );
        assert_eq!(
            ledger.upsert(1, &path("1.jpg"), "aa", 99),
            UpsertOutcome::Unchanged
        );

        let obs = ledger.lookup(1).expect("present");
        assert_eq!(obs.occurrences, 1);
        let stats = ledger.stats();
        assert_eq!((stats.artifacts, stats.distinct, stats.count_sum), (1, 1, 1));

        // First discovery time sticks across re-observations.
        let snapshot = ledger.snapshot();
        assert_eq!(snapshot[0].1.discovered_at_epoch_secs, 10);
    }

    #[test]
    fn overwrite_moves_exactly_one_count() {
        let ledger = Ledger::new();
        ledger.upsert(1, &path("1.jpg"), "aa", 10);
        ledger.upsert(2, &path("2.jpg"), "aa", 11);
        assert_eq!(
            ledger.upsert(1, &path("1.jpg"), "bb", 12),
            UpsertOutcome::Replaced
        );

        assert_eq!(ledger.lookup(1).expect("seq 1").fingerprint, "bb");
        assert_eq!(ledger.lookup(1).expect("seq 1").occurrences, 1);
        assert_eq!(ledger.lookup(2).expect("seq 2").occurrences, 1);

        // seq 1 keeps its original discovery time through the overwrite.
        assert_eq!(ledger.snapshot()[0].1.discovered_at_epoch_secs, 10);
    }

    #[test]
    fn overwrite_drops_a_count_that_reaches_zero() {
        let ledger = Ledger::new();
        ledger.upsert(1, &path("1.jpg"), "aa", 10);
        ledger.upsert(1, &path("1.jpg"), "bb", 11);

        let stats = ledger.stats();
        assert_eq!((stats.artifacts, stats.distinct, stats.count_sum), (1, 1, 1));
    }

    #[test]
    fn path_follows_latest_observation_without_count_change() {
        let ledger = Ledger::new();
        ledger.upsert(7, &path("7.jpg"), "aa", 10);
        assert_eq!(
            ledger.upsert(7, &path("7.png"), "aa", 11),
            UpsertOutcome::Unchanged
        );
        assert_eq!(ledger.snapshot()[0].1.path, path("7.png"));
        assert_eq!(ledger.stats().count_sum, 1);
    }

    #[test]
    fn remove_releases_the_occurrence() {
        let ledger = Ledger::new();
        ledger.upsert(1, &path("1.jpg"), "aa", 10);
        ledger.upsert(2, &path("2.jpg"), "aa", 11);

        let removed = ledger.remove(2).expect("removed");
        assert_eq!(removed.fingerprint, "aa");
        assert_eq!(ledger.lookup(1).expect("seq 1").occurrences, 1);
        assert!(ledger.lookup(2).is_none());
        assert!(ledger.remove(2).is_none());
    }

    #[test]
    fn snapshot_is_ordered_by_sequence() {
        let ledger = Ledger::new();
        ledger.upsert(12, &path("12.jpg"), "cc", 10);
        ledger.upsert(2, &path("2.jpg"), "aa", 11);
        ledger.upsert(7, &path("7.jpg"), "bb", 12);

        let seqs = ledger
            .snapshot()
            .into_iter()
            .map(|(seq, _)| seq)
            .collect::<Vec<_>>();
        assert_eq!(seqs, vec![2, 7, 12]);
    }

    #[test]
    fn concurrent_overwrites_never_expose_a_half_applied_update() {
        let ledger = Arc::new(Ledger::new());

        let writer = {
            let ledger = Arc::clone(&ledger);
            thread::spawn(move || {
                for round in 0..400u64 {
                    let seq = round % 8 + 1;
                    let fp = if round % 2 == 0 { "even" } else { "odd" };
                    ledger.upsert(seq, &path(&format!("{seq}.jpg")), fp, round);
                }
            })
        };

        let reader = {
            let ledger = Arc::clone(&ledger);
            thread::spawn(move || {
                for _ in 0..400 {
                    let stats = ledger.stats();
                    assert_eq!(stats.count_sum, stats.artifacts as u64);
                    if let Some(obs) = ledger.lookup(3) {
                        assert!(obs.occurrences >= 1);
                    }
                }
            })
        };

        writer.join().expect("writer");
        reader.join().expect("reader");

        let stats = ledger.stats();
        assert_eq!(stats.artifacts, 8);
        assert_eq!(stats.count_sum, 8);
    }
}
