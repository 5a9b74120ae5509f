use eyre::Result;
use std::path::Path;
use std::sync::Arc;

use super::{FileOutcome, Operation};
use crate::empty_dirs::EmptyDirIndex;

/// Finds directories holding at most `threshold` immediate files.
pub struct FindEmptyDirsOp {
    index: Arc<EmptyDirIndex>,
    threshold: u64,
}

impl FindEmptyDirsOp {
    pub fn new(index: Arc<EmptyDirIndex>, threshold: u64) -> Self {
        Self { index, threshold }
    }
}

impl Operation for FindEmptyDirsOp {
    fn name(&self) -> &'static str {
        "empty-dirs"
    }

    fn prepare_directory(&self, dir: &Path) -> Result<()> {
        self.index.register(dir);
        Ok(())
    }

    fn per_file(&self, path: &Path) -> FileOutcome {
        match path.parent() {
            Some(parent) => {
                self.index.add_file(parent);
                FileOutcome::Done
            }
            None => FileOutcome::Skipped,
        }
    }

    fn post_directory(&self, dir: &Path) {
        self.index.settle(dir, self.threshold);
    }

    fn directory_aborted(&self, dir: &Path) {
        // Unlisted directories have an unknown count.
        self.index.forget(dir);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_against_threshold_without_touching_disk() {
        let index = Arc::new(EmptyDirIndex::new());
        let op = FindEmptyDirsOp::new(Arc::clone(&index), 1);
        let a = Path::new("/t/a");
        let b = Path::new("/t/b");

        op.prepare_directory(a).unwrap();
        op.prepare_directory(b).unwrap();
        op.per_file(&b.join("1"));
        op.per_file(&b.join("2"));
        op.post_directory(a);
        op.post_directory(b);

        let rows = index.ranked(None);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].path, a);
        assert_eq!(rows[0].files, 0);
    }

    #[test]
    fn aborted_directories_are_not_reported() {
        let index = Arc::new(EmptyDirIndex::new());
        let op = FindEmptyDirsOp::new(Arc::clone(&index), 0);
        let locked = Path::new("/t/locked");

        op.prepare_directory(locked).unwrap();
        op.directory_aborted(locked);
        assert!(index.is_empty());
    }
}
