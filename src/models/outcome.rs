//! Per-region results and the batch summary.

use crate::error::ItemError;

use super::Region;

/// Terminal state of processing one region.
#[derive(Debug)]
pub enum ProcessingResult {
    /// Downloaded, processed and relocated.
    Processed { files_moved: usize },
    /// Output for the region was already present.
    Skipped,
    /// Any stage failed; nothing more is done for the region in this run.
    Failed { error: ItemError },
}

/// Counts of outcomes across a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Names of the failed regions, in processing order.
    pub failed_items: Vec<String>,
}

impl RunSummary {
    pub fn record(&mut self, region: &Region, result: &ProcessingResult) {
        match result {
            ProcessingResult::Processed { .. } => self.processed += 1,
            ProcessingResult::Skipped => self.skipped += 1,
            ProcessingResult::Failed { .. } => {
                self.failed += 1;
                self.failed_items.push(region.name.clone());
            }
        }
    }

    pub fn total(&self) -> usize {
        self.processed + self.skipped + self.failed
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}
