//! Job id allocation.

use std::sync::atomic::{AtomicU64, Ordering};

/// Identifier of one objective evaluation. Starts at 1 within a run.
pub type JobId = u64;

/// Run-scoped job id counter for a single driving thread.
///
/// Ids are handed out as 1, 2, 3, ... with no gaps and no reuse. A fresh
/// sequencer (a fresh run) starts again from 1.
#[derive(Debug, Clone, Default)]
pub struct JobSequencer {
    last: JobId,
}

impl JobSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next job id.
    pub fn next_id(&mut self) -> JobId {
        self.last += 1;
        self.last
    }

    /// The most recently allocated id, or 0 before the first allocation.
    pub fn last_id(&self) -> JobId {
        self.last
    }
}

/// Job id counter that can be shared between threads.
///
/// Each caller still has to write its parameter record before waiting on
/// its own result; the counter only guarantees unique, gap-free ids.
#[derive(Debug, Default)]
pub struct AtomicJobSequencer {
    last: AtomicU64,
}

impl AtomicJobSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> JobId {
        self.last.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn last_id(&self) -> JobId {
        self.last.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn ids_are_consecutive_from_one() {
        let mut seq = JobSequencer::new();
        assert_eq!(seq.last_id(), 0);
        let ids: Vec<JobId> = (0..100).map(|_| seq.next_id()).collect();
        assert_eq!(ids, (1..=100).collect::<Vec<_>>());
        assert_eq!(seq.last_id(), 100);
    }

    #[test]
    fn fresh_sequencer_restarts() {
        let mut first = JobSequencer::new();
        first.next_id();
        first.next_id();
        let mut second = JobSequencer::new();
        assert_eq!(second.next_id(), 1);
    }

    #[test]
    fn atomic_sequencer_hands_out_unique_ids() {
        let seq = Arc::new(AtomicJobSequencer::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let seq = Arc::clone(&seq);
                thread::spawn(move || (0..250).map(|_| seq.next_id()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = BTreeSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate id {id}");
            }
        }
        assert_eq!(seen.len(), 2000);
        assert_eq!(seen.first(), Some(&1));
        assert_eq!(seen.last(), Some(&2000));
        assert_eq!(seq.last_id(), 2000);
    }
}
