//! Thread-safe latest rank counts.

use std::sync::{Mutex, PoisonError};

use crate::detection::{DetectedObject, RankCounts};

/// Counts from the most recent classification, shared between the
/// processing loop (writer) and any number of readers.
///
/// Readers always get a copy; the lock is never held beyond the copy.
#[derive(Debug, Default)]
pub struct RankTally {
    counts: Mutex<RankCounts>,
}

impl RankTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the counts with a tally of `objects` and return a copy.
    ///
    /// Replacing rather than merging means a rank that disappears between
    /// frames drops back to zero.
    pub fn replace(&self, objects: &[DetectedObject]) -> RankCounts {
        let fresh = RankCounts::from_objects(objects);
        let mut counts = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        *counts = fresh;
        fresh
    }

    /// Copy of the current counts.
    pub fn snapshot(&self) -> RankCounts {
        *self.counts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reset every rank to zero.
    pub fn clear(&self) {
        self.replace(&[]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rank::Rank;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_replace_not_merge() {
        let tally = RankTally::new();
        tally.replace(&[
            DetectedObject::at(Rank::D, 0, 0),
            DetectedObject::at(Rank::D, 1, 0),
            DetectedObject::at(Rank::S, 2, 0),
        ]);

        let counts = tally.snapshot();
        assert_eq!(counts.get(Rank::D), 2);
        assert_eq!(counts.get(Rank::S), 1);

        tally.replace(&[DetectedObject::at(Rank::A, 0, 0)]);
        let counts = tally.snapshot();
        assert_eq!(counts.get(Rank::D), 0);
        assert_eq!(counts.get(Rank::S), 0);
        assert_eq!(counts.get(Rank::A), 1);
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let tally = RankTally::new();
        tally.replace(&[DetectedObject::at(Rank::Ss, 0, 0)]);
        let before = tally.snapshot();

        tally.clear();

        assert_eq!(before.get(Rank::Ss), 1);
        assert_eq!(tally.snapshot().total(), 0);
    }

    #[test]
    fn test_concurrent_readers_see_whole_snapshots() {
        let tally = Arc::new(RankTally::new());
        let writer = {
            let tally = Arc::clone(&tally);
            thread::spawn(move || {
                for i in 0..500 {
                    let rank = if i % 2 == 0 { Rank::A } else { Rank::F };
                    tally.replace(&[DetectedObject::at(rank, 0, 0), DetectedObject::at(rank, 1, 0)]);
                }
            })
        };

        for _ in 0..500 {
            let counts = tally.snapshot();
            // Either empty (initial) or exactly one rank with two objects
            assert!(counts.total() == 0 || counts.total() == 2);
            assert!(counts.get(Rank::A) == 0 || counts.get(Rank::F) == 0);
        }
        writer.join().unwrap();
    }
}
