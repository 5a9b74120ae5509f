//! Per-entry operations driven by the tree walker.
//!
//! An operation decides what happens to each listed file and, around each
//! directory, what happens before its children are dispatched and after all
//! of them have finished. It never recurses itself.

mod copy;
mod count;
mod delete;
mod empty_dirs;

pub use copy::{CopyContext, CopyOp, COPY_BUFFER_SIZE};
pub use count::CountOp;
pub use delete::DeleteOp;
pub use empty_dirs::FindEmptyDirsOp;

use eyre::Result;
use std::path::Path;

/// What happened to one file entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    /// The operation's action was carried out.
    Done,
    /// Nothing to do: the destination already matched.
    Unchanged,
    /// Entry type not handled by this operation.
    Skipped,
    /// The action failed; the cause has been logged.
    Failed,
}

pub trait Operation: Send + Sync {
    /// Short name used in logs and summaries.
    fn name(&self) -> &'static str;

    /// Pre-order hook, run before `dir` is listed. An error aborts the subtree.
    fn prepare_directory(&self, _dir: &Path) -> Result<()> {
        Ok(())
    }

    fn per_file(&self, path: &Path) -> FileOutcome;

    /// Post-order hook, run once every descendant of `dir` has finished.
    fn post_directory(&self, _dir: &Path) {}

    /// Runs instead of `post_directory` when `dir` could not be prepared or listed.
    fn directory_aborted(&self, _dir: &Path) {}
}
