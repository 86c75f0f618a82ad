//! Deduplication of candidate records within one search run
//!
//! Overlapping grid cells return the same place repeatedly; only the first
//! record for a given place id is admitted. Check-and-insert is a single
//! short critical section so two cells racing on the same id can never both
//! see "not yet present".

use std::collections::HashSet;
use std::sync::Mutex;

use crate::types::CandidateRecord;

#[derive(Debug, Default)]
struct DedupInner {
    /// Place ids admitted so far (source of truth)
    seen: HashSet<String>,
    /// Admitted records in first-admission order
    admitted: Vec<CandidateRecord>,
}

/// First-writer-wins record set keyed by provider place id
#[derive(Debug, Default)]
pub struct Deduplicator {
    inner: Mutex<DedupInner>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a record if its place id has not been seen in this run
    ///
    /// Returns true for a newly admitted record. Later duplicates are
    /// discarded even when they carry different metadata; no merging.
    pub fn admit(&self, record: CandidateRecord) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.seen.insert(record.place_id.clone()) {
            inner.admitted.push(record);
            true
        } else {
            false
        }
    }

    /// Number of records admitted so far
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .admitted
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clone of the admitted records in first-admission order
    pub fn snapshot(&self) -> Vec<CandidateRecord> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .admitted
            .clone()
    }

    /// Consume the set, returning the admitted records without cloning
    pub fn into_records(self) -> Vec<CandidateRecord> {
        self.inner
            .into_inner()
            .unwrap_or_else(|e| e.into_inner())
            .admitted
    }
}
