use crate::state::{CrawlResult, ResultState};

/// Running totals for one crawl run
///
/// Only the orchestrator mutates this, once per finished worker slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressState {
    pub completed: usize,
    pub target: usize,
    pub success: usize,
    pub fail: usize,
    pub skipped: usize,
}

impl ProgressState {
    pub fn new(target: usize) -> Self {
        Self {
            target,
            ..Self::default()
        }
    }

    /// Folds one worker's results into the totals
    pub fn merge(&mut self, results: &[CrawlResult]) {
        for result in results {
            match result.state {
                ResultState::Success => self.success += 1,
                ResultState::Fail => self.fail += 1,
                ResultState::Skipped => self.skipped += 1,
            }
        }
        self.completed = (self.completed + results.len()).min(self.target);
    }

    /// Counts items from a slot that died without reporting
    pub fn merge_lost(&mut self, count: usize) {
        self.fail += count;
        self.completed = (self.completed + count).min(self.target);
    }

    /// Completion percentage in 0..=100; an empty run is complete
    pub fn percentage(&self) -> u8 {
        if self.target == 0 {
            return 100;
        }
        let pct = self.completed.saturating_mul(100) / self.target;
        pct.min(100) as u8
    }

    pub fn is_complete(&self) -> bool {
        self.completed >= self.target
    }
}
