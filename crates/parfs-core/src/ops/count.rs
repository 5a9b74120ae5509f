use std::fs;
use std::path::Path;
use std::sync::Arc;

use super::{FileOutcome, Operation};
use crate::counters::ProgressCounters;

/// Scan only. With `measure_bytes`, sizes are summed into the byte counter.
pub struct CountOp {
    counters: Arc<ProgressCounters>,
    measure_bytes: bool,
}

impl CountOp {
    pub fn new(counters: Arc<ProgressCounters>, measure_bytes: bool) -> Self {
        Self {
            counters,
            measure_bytes,
        }
    }
}

impl Operation for CountOp {
    fn name(&self) -> &'static str {
        "count"
    }

    fn per_file(&self, path: &Path) -> FileOutcome {
        if !self.measure_bytes {
            return FileOutcome::Done;
        }
        match fs::symlink_metadata(path) {
            Ok(md) => {
                self.counters.add_bytes(md.len());
                FileOutcome::Done
            }
            Err(err) => {
                log::warn!("stat {}: {}", path.display(), err);
                FileOutcome::Failed
            }
        }
    }
}
