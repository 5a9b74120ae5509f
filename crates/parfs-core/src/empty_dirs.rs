use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Directory path to immediate-file count, filled in during traversal.
///
/// Every visited directory is registered once with a zero count; files are
/// added to their parent's entry; once a directory's subtree has finished the
/// entry is dropped if its count exceeds the threshold.
#[derive(Debug, Default)]
pub struct EmptyDirIndex {
    counts: RwLock<HashMap<PathBuf, u64>>,
}

/// One row of the final ranking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmptyDirRow {
    pub path: PathBuf,
    pub files: u64,
}

impl EmptyDirIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `dir`. A second registration keeps the existing count.
    pub fn register(&self, dir: &Path) {
        self.counts.write().entry(dir.to_path_buf()).or_insert(0);
    }

    /// Count one file under `dir`.
    pub fn add_file(&self, dir: &Path) {
        let mut counts = self.counts.write();
        match counts.get_mut(dir) {
            Some(count) => *count += 1,
            None => {
                counts.insert(dir.to_path_buf(), 1);
            }
        }
    }

    /// Drop `dir` unless its count is at most `threshold`. Returns whether it was kept.
    pub fn settle(&self, dir: &Path, threshold: u64) -> bool {
        let mut counts = self.counts.write();
        match counts.get(dir) {
            Some(&count) if count <= threshold => true,
            Some(_) => {
                counts.remove(dir);
                false
            }
            None => false,
        }
    }

    /// Drop `dir` regardless of its count.
    pub fn forget(&self, dir: &Path) {
        self.counts.write().remove(dir);
    }

    pub fn count(&self, dir: &Path) -> Option<u64> {
        self.counts.read().get(dir).copied()
    }

    pub fn len(&self) -> usize {
        self.counts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.read().is_empty()
    }

    /// Retained directories sorted by file count descending, then by path.
    ///
    /// `limit` of `None` returns every row.
    pub fn ranked(&self, limit: Option<usize>) -> Vec<EmptyDirRow> {
        let mut rows: Vec<EmptyDirRow> = self
            .counts
            .read()
            .iter()
            .map(|(path, &files)| EmptyDirRow {
                path: path.clone(),
                files,
            })
            .collect();
        rows.sort_by(|a, b| b.files.cmp(&a.files).then_with(|| a.path.cmp(&b.path)));
        if let Some(limit) = limit {
            rows.truncate(limit);
        }
        rows
    }
}
