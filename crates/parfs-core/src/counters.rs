use std::sync::atomic::{AtomicU64, Ordering};

/// Shared progress counters, incremented lock-free by every worker.
///
/// Totals grow as entries are discovered; processed counts grow as entries
/// finish, whether they succeeded or not.
#[derive(Debug, Default)]
pub struct ProgressCounters {
    total_files: AtomicU64,
    total_dirs: AtomicU64,
    processed_files: AtomicU64,
    processed_dirs: AtomicU64,
    bytes: AtomicU64,
    unchanged_files: AtomicU64,
    skipped_files: AtomicU64,
    failed_files: AtomicU64,
}

/// Point-in-time copy of [`ProgressCounters`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub total_files: u64,
    pub total_dirs: u64,
    pub processed_files: u64,
    pub processed_dirs: u64,
    pub bytes: u64,
    pub unchanged_files: u64,
    pub skipped_files: u64,
    pub failed_files: u64,
}

impl ProgressCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_discovered(&self, dirs: u64, files: u64) {
        self.total_dirs.fetch_add(dirs, Ordering::Relaxed);
        self.total_files.fetch_add(files, Ordering::Relaxed);
    }

    pub fn file_processed(&self) {
        self.processed_files.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dir_processed(&self) {
        self.processed_dirs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_bytes(&self, bytes: u64) {
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn file_unchanged(&self) {
        self.unchanged_files.fetch_add(1, Ordering::Relaxed);
    }

    pub fn file_skipped(&self) {
        self.skipped_files.fetch_add(1, Ordering::Relaxed);
    }

    pub fn file_failed(&self) {
        self.failed_files.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            total_files: self.total_files.load(Ordering::Relaxed),
            total_dirs: self.total_dirs.load(Ordering::Relaxed),
            processed_files: self.processed_files.load(Ordering::Relaxed),
            processed_dirs: self.processed_dirs.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
            unchanged_files: self.unchanged_files.load(Ordering::Relaxed),
            skipped_files: self.skipped_files.load(Ordering::Relaxed),
            failed_files: self.failed_files.load(Ordering::Relaxed),
        }
    }
}

impl CounterSnapshot {
    /// True once every discovered entry has been processed.
    pub fn is_settled(&self) -> bool {
        self.processed_files == self.total_files && self.processed_dirs == self.total_dirs
    }
}
