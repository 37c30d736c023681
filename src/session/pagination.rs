//! Incremental batch loading over the unit index space.

use std::collections::BTreeSet;

use log::debug;

// ---------------------------------------------------------------------------
// Load phase
// ---------------------------------------------------------------------------

/// Where the controller is in its load cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    /// No batch requested yet.
    Idle,
    /// A batch has been handed out and not yet settled.
    Loading,
    /// The last batch settled.
    Loaded,
}

// ---------------------------------------------------------------------------
// PaginationController
// ---------------------------------------------------------------------------

/// Tracks which unit indices have been requested and whether more remain.
///
/// Indices grow monotonically from 0; `has_more` transitions true → false
/// exactly once and never back. Requesting a batch while one is in flight is
/// a no-op, so duplicate calls cannot double-enqueue.
#[derive(Debug)]
pub struct PaginationController {
    batch_size: usize,
    total_units: usize,
    loaded: BTreeSet<usize>,
    has_more: bool,
    phase: LoadPhase,
}

impl PaginationController {
    pub fn new(batch_size: usize, total_units: usize) -> Self {
        Self {
            batch_size,
            total_units,
            loaded: BTreeSet::new(),
            has_more: total_units > 0,
            phase: LoadPhase::Idle,
        }
    }

    /// Hand out the next batch of unit indices, or `None` when exhausted or
    /// already loading.
    ///
    /// The batch starts right after the highest index handed out so far and
    /// is clamped to `total_units`, so the final batch may be short.
    pub fn begin_batch(&mut self) -> Option<Vec<usize>> {
        if !self.has_more || self.phase == LoadPhase::Loading {
            return None;
        }
        let next_start = self.loaded.iter().next_back().map_or(0, |&max| max + 1);
        let end = (next_start + self.batch_size).min(self.total_units);
        if next_start >= end {
            self.has_more = false;
            return None;
        }

        let batch: Vec<usize> = (next_start..end).collect();
        self.loaded.extend(batch.iter().copied());
        if next_start + self.batch_size >= self.total_units {
            self.has_more = false;
        }
        self.phase = LoadPhase::Loading;
        debug!(
            "batch {next_start}..{end} requested ({} loaded, has_more={})",
            self.loaded.len(),
            self.has_more
        );
        Some(batch)
    }

    /// Mark the in-flight batch as settled.
    pub fn settle_batch(&mut self) {
        if self.phase == LoadPhase::Loading {
            self.phase = LoadPhase::Loaded;
        }
    }

    pub fn phase(&self) -> LoadPhase {
        self.phase
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn loaded_indices(&self) -> &BTreeSet<usize> {
        &self.loaded
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn total_units(&self) -> usize {
        self.total_units
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ten_batches_cover_one_hundred_units() {
        let mut pagination = PaginationController::new(10, 100);
        for call in 0..10 {
            let batch = pagination.begin_batch().expect("batch available");
            assert_eq!(batch, (call * 10..(call + 1) * 10).collect::<Vec<_>>());
            pagination.settle_batch();
        }
        assert!(!pagination.has_more());
        assert_eq!(pagination.loaded_indices().len(), 100);
        assert_eq!(*pagination.loaded_indices().iter().next_back().unwrap(), 99);

        // The eleventh call is a no-op leaving state unchanged.
        assert_eq!(pagination.begin_batch(), None);
        assert_eq!(pagination.loaded_indices().len(), 100);
        assert_eq!(pagination.phase(), LoadPhase::Loaded);
    }

    #[test]
    fn final_batch_is_clamped_to_total_units() {
        let mut pagination = PaginationController::new(15, 100);
        let mut seen = Vec::new();
        while let Some(batch) = pagination.begin_batch() {
            seen.extend(batch);
            pagination.settle_batch();
        }
        assert_eq!(seen.len(), 100);
        assert_eq!(seen.last(), Some(&99));
        assert!(!pagination.has_more());
    }

    #[test]
    fn duplicate_calls_before_settle_do_not_double_enqueue() {
        let mut pagination = PaginationController::new(10, 100);
        let first = pagination.begin_batch().unwrap();
        assert_eq!(first.len(), 10);
        assert_eq!(pagination.begin_batch(), None);
        assert_eq!(pagination.loaded_indices().len(), 10);

        pagination.settle_batch();
        let second = pagination.begin_batch().unwrap();
        assert_eq!(second[0], 10);
    }

    #[test]
    fn has_more_never_returns_to_true() {
        let mut pagination = PaginationController::new(5, 5);
        pagination.begin_batch().unwrap();
        assert!(!pagination.has_more());
        pagination.settle_batch();
        assert_eq!(pagination.begin_batch(), None);
        assert!(!pagination.has_more());
    }

    #[test]
    fn empty_index_space_has_nothing_to_load() {
        let mut pagination = PaginationController::new(10, 0);
        assert!(!pagination.has_more());
        assert_eq!(pagination.begin_batch(), None);
    }
}
