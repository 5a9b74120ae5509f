//! Concurrent tree walker.
//!
//! Two fixed pools serve the whole run: directory workers list directories
//! and fan their children out, file workers apply the operation to each file.
//! Every directory is a node with a count of outstanding children plus one
//! token held while it is being listed. Whoever drops the count to zero runs
//! the post-order hook and releases the parent, so a directory's hook always
//! runs after its entire subtree. Completing the root closes the done channel
//! and every worker exits.

use crossbeam_channel::{bounded, select, Receiver, Sender, TrySendError};
use eyre::{bail, Context, Result};
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, Scope};
use std::time::{Duration, Instant};

use crate::counters::{CounterSnapshot, ProgressCounters};
use crate::errors::retry_io;
use crate::listing::{EntryLister, Listing};
use crate::ops::{FileOutcome, Operation};

const DIR_WORKER_STACK: usize = 8 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct WalkOptions {
    /// Threads listing directories.
    pub dir_workers: usize,
    /// Threads applying the operation to files.
    pub file_workers: usize,
    /// Queued directories before discoverers walk children inline.
    pub dir_queue_capacity: usize,
    /// Queued files before discoverers block.
    pub file_queue_capacity: usize,
    /// Extra attempts for a listing that fails with a transient error.
    pub listing_retries: u8,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            dir_workers: 2,
            file_workers: 4,
            dir_queue_capacity: 65_536,
            file_queue_capacity: 4096,
            listing_retries: 3,
        }
    }
}

/// Result of a completed walk.
#[derive(Debug, Clone)]
pub struct WalkSummary {
    pub root: PathBuf,
    pub counters: CounterSnapshot,
    pub elapsed: Duration,
}

struct DirNode {
    path: PathBuf,
    parent: Option<Arc<DirNode>>,
    pending: AtomicUsize,
    aborted: AtomicBool,
}

impl DirNode {
    fn new(path: PathBuf, parent: Option<Arc<DirNode>>) -> Arc<Self> {
        Arc::new(Self {
            path,
            parent,
            pending: AtomicUsize::new(1),
            aborted: AtomicBool::new(false),
        })
    }
}

struct FileTask {
    path: PathBuf,
    parent: Arc<DirNode>,
}

pub struct TreeWalker<'a> {
    lister: &'a dyn EntryLister,
    operation: &'a dyn Operation,
    counters: Arc<ProgressCounters>,
    options: WalkOptions,
}

impl<'a> TreeWalker<'a> {
    pub fn new(
        lister: &'a dyn EntryLister,
        operation: &'a dyn Operation,
        counters: Arc<ProgressCounters>,
        options: WalkOptions,
    ) -> Self {
        Self {
            lister,
            operation,
            counters,
            options,
        }
    }

    /// Walk `root` to completion.
    ///
    /// Only a root that cannot be resolved to an existing directory is an
    /// error; everything below it is best effort. A symlinked root is refused
    /// rather than followed.
    pub fn walk(&self, root: &Path) -> Result<WalkSummary> {
        let root = std::path::absolute(root)
            .with_context(|| format!("resolving {}", root.display()))?;
        let md = std::fs::symlink_metadata(&root)
            .with_context(|| format!("reading {}", root.display()))?;
        if md.file_type().is_symlink() {
            bail!(
                "{} is a symbolic link; pass the directory it points to",
                root.display()
            );
        }
        if !md.is_dir() {
            bail!("{} is not a directory", root.display());
        }

        let started = Instant::now();
        log::info!(
            "{} {} with {} directory / {} file workers",
            self.operation.name(),
            root.display(),
            self.options.dir_workers.max(1),
            self.options.file_workers.max(1)
        );

        let (dir_tx, dir_rx) = bounded(self.options.dir_queue_capacity.max(1));
        let (file_tx, file_rx) = bounded(self.options.file_queue_capacity.max(1));
        let (done_tx, done_rx) = bounded::<()>(0);
        let scheduler = Scheduler {
            walker: self,
            dir_tx,
            file_tx,
            done: Mutex::new(Some(done_tx)),
        };

        self.counters.add_discovered(1, 0);
        thread::scope(|scope| -> Result<()> {
            if let Err(err) = scheduler.spawn_workers(scope, &dir_rx, &file_rx, &done_rx) {
                scheduler.finish();
                return Err(err);
            }
            scheduler.dispatch_dir(DirNode::new(root.clone(), None));
            Ok(())
        })?;

        Ok(WalkSummary {
            root,
            counters: self.counters.snapshot(),
            elapsed: started.elapsed(),
        })
    }
}

struct Scheduler<'w, 'a> {
    walker: &'w TreeWalker<'a>,
    dir_tx: Sender<Arc<DirNode>>,
    file_tx: Sender<FileTask>,
    /// Dropped when the root completes, which wakes every worker.
    done: Mutex<Option<Sender<()>>>,
}

impl<'w, 'a> Scheduler<'w, 'a> {
    fn spawn_workers<'scope>(
        &'scope self,
        scope: &'scope Scope<'scope, '_>,
        dir_rx: &Receiver<Arc<DirNode>>,
        file_rx: &Receiver<FileTask>,
        done_rx: &Receiver<()>,
    ) -> Result<()> {
        for idx in 0..self.walker.options.dir_workers.max(1) {
            let tasks = dir_rx.clone();
            let done = done_rx.clone();
            thread::Builder::new()
                .name(format!("parfs-dir-{idx}"))
                .stack_size(DIR_WORKER_STACK)
                .spawn_scoped(scope, move || self.dir_worker(tasks, done))
                .context("spawning directory worker")?;
        }
        for idx in 0..self.walker.options.file_workers.max(1) {
            let tasks = file_rx.clone();
            let done = done_rx.clone();
            thread::Builder::new()
                .name(format!("parfs-file-{idx}"))
                .spawn_scoped(scope, move || self.file_worker(tasks, done))
                .context("spawning file worker")?;
        }
        Ok(())
    }

    fn dir_worker(&self, tasks: Receiver<Arc<DirNode>>, done: Receiver<()>) {
        loop {
            select! {
                recv(tasks) -> node => match node {
                    Ok(node) => self.process_dir(node),
                    Err(_) => break,
                },
                recv(done) -> _ => break,
            }
        }
    }

    fn file_worker(&self, tasks: Receiver<FileTask>, done: Receiver<()>) {
        loop {
            select! {
                recv(tasks) -> task => match task {
                    Ok(task) => self.process_file(task),
                    Err(_) => break,
                },
                recv(done) -> _ => break,
            }
        }
    }

    /// Queue a directory, or walk it on this thread when the queue is full.
    fn dispatch_dir(&self, node: Arc<DirNode>) {
        match self.dir_tx.try_send(node) {
            Ok(()) => {}
            Err(TrySendError::Full(node)) | Err(TrySendError::Disconnected(node)) => {
                self.process_dir(node)
            }
        }
    }

    fn dispatch_file(&self, task: FileTask) {
        if let Err(err) = self.file_tx.send(task) {
            self.process_file(err.into_inner());
        }
    }

    fn process_dir(&self, node: Arc<DirNode>) {
        let walker = self.walker;
        let listing = match panic::catch_unwind(AssertUnwindSafe(|| self.prepare_and_list(&node.path))) {
            Ok(Ok(listing)) => listing,
            Ok(Err(err)) => {
                log::warn!("skipping subtree {}: {:#}", node.path.display(), err);
                self.abort(node);
                return;
            }
            Err(_) => {
                log::error!("{} panicked entering {}", walker.operation.name(), node.path.display());
                self.abort(node);
                return;
            }
        };

        walker
            .counters
            .add_discovered(listing.dirs.len() as u64, listing.files.len() as u64);
        node.pending.fetch_add(listing.len(), Ordering::AcqRel);

        for path in listing.files {
            self.dispatch_file(FileTask {
                path,
                parent: Arc::clone(&node),
            });
        }
        for path in listing.dirs {
            self.dispatch_dir(DirNode::new(path, Some(Arc::clone(&node))));
        }

        // Listing token.
        self.release(node);
    }

    fn prepare_and_list(&self, dir: &Path) -> Result<Listing> {
        let walker = self.walker;
        walker.operation.prepare_directory(dir)?;
        retry_io(walker.options.listing_retries, || walker.lister.list(dir))
            .with_context(|| format!("listing {}", dir.display()))
    }

    fn process_file(&self, task: FileTask) {
        let walker = self.walker;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| walker.operation.per_file(&task.path)))
            .unwrap_or_else(|_| {
                log::error!("{} panicked on {}", walker.operation.name(), task.path.display());
                FileOutcome::Failed
            });

        match outcome {
            FileOutcome::Done => {}
            FileOutcome::Unchanged => walker.counters.file_unchanged(),
            FileOutcome::Skipped => walker.counters.file_skipped(),
            FileOutcome::Failed => walker.counters.file_failed(),
        }
        walker.counters.file_processed();
        self.release(task.parent);
    }

    fn abort(&self, node: Arc<DirNode>) {
        node.aborted.store(true, Ordering::Release);
        self.walker.operation.directory_aborted(&node.path);
        self.release(node);
    }

    /// Drop one reference on `node`, completing it and any ancestors that
    /// reach zero along the way.
    fn release(&self, node: Arc<DirNode>) {
        let mut current = node;
        loop {
            if current.pending.fetch_sub(1, Ordering::AcqRel) != 1 {
                return;
            }
            self.complete_dir(&current);
            match current.parent.clone() {
                Some(parent) => current = parent,
                None => {
                    self.finish();
                    return;
                }
            }
        }
    }

    fn complete_dir(&self, node: &DirNode) {
        let walker = self.walker;
        if !node.aborted.load(Ordering::Acquire) {
            let path = node.path.as_path();
            if panic::catch_unwind(AssertUnwindSafe(|| walker.operation.post_directory(path)))
                .is_err()
            {
                log::error!("{} panicked finishing {}", walker.operation.name(), path.display());
            }
        }
        walker.counters.dir_processed();
    }

    fn finish(&self) {
        self.done.lock().take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::ReadDirLister;
    use std::collections::HashMap;
    use std::io;

    /// Records hook order so the post-order guarantee can be checked.
    #[derive(Default)]
    struct Journal {
        events: Mutex<Vec<String>>,
    }

    impl Operation for Journal {
        fn name(&self) -> &'static str {
            "journal"
        }

        fn per_file(&self, path: &Path) -> FileOutcome {
            self.events.lock().push(format!("file {}", path.display()));
            FileOutcome::Done
        }

        fn post_directory(&self, dir: &Path) {
            self.events.lock().push(format!("dir {}", dir.display()));
        }
    }

    /// In-memory tree keyed by directory path.
    struct MapLister {
        tree: HashMap<PathBuf, Listing>,
    }

    impl EntryLister for MapLister {
        fn list(&self, dir: &Path) -> io::Result<Listing> {
            self.tree
                .get(dir)
                .cloned()
                .ok_or_else(|| io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
        }
    }

    fn listing(dirs: &[&str], files: &[&str]) -> Listing {
        Listing {
            dirs: dirs.iter().map(PathBuf::from).collect(),
            files: files.iter().map(PathBuf::from).collect(),
        }
    }

    #[test]
    fn descendants_finish_before_their_directory() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        std::fs::create_dir_all(root.join("a/b")).unwrap();
        std::fs::write(root.join("a/b/f1"), b"1").unwrap();
        std::fs::write(root.join("a/f2"), b"2").unwrap();
        std::fs::write(root.join("f3"), b"3").unwrap();

        let journal = Journal::default();
        let counters = Arc::new(ProgressCounters::new());
        let summary = TreeWalker::new(&ReadDirLister, &journal, counters, WalkOptions::default())
            .walk(root)
            .unwrap();

        let events = journal.events.lock().clone();
        let pos = |needle: &str| events.iter().position(|e| e == needle).unwrap();
        let d = |p: &str| format!("dir {}", root.join(p).display());
        let f = |p: &str| format!("file {}", root.join(p).display());

        assert!(pos(&f("a/b/f1")) < pos(&d("a/b")));
        assert!(pos(&d("a/b")) < pos(&d("a")));
        assert!(pos(&f("a/f2")) < pos(&d("a")));
        assert!(pos(&d("a")) < pos(&format!("dir {}", root.display())));
        assert_eq!(events.last().unwrap(), &format!("dir {}", root.display()));

        assert_eq!(summary.counters.total_files, 3);
        assert_eq!(summary.counters.processed_files, 3);
        assert_eq!(summary.counters.total_dirs, 3);
        assert!(summary.counters.is_settled());
    }

    #[test]
    fn listing_failure_aborts_only_that_subtree() {
        let lister = MapLister {
            tree: HashMap::from([
                (PathBuf::from("/"), listing(&["/ok", "/locked"], &["/top"])),
                (PathBuf::from("/ok"), listing(&[], &["/ok/1", "/ok/2"])),
            ]),
        };
        let journal = Journal::default();
        let counters = Arc::new(ProgressCounters::new());
        let options = WalkOptions {
            listing_retries: 0,
            ..WalkOptions::default()
        };
        let summary = TreeWalker::new(&lister, &journal, counters, options)
            .walk(Path::new("/"))
            .unwrap();

        let events = journal.events.lock().clone();
        assert!(events.contains(&"dir /ok".to_string()));
        assert!(!events.contains(&"dir /locked".to_string()));
        assert_eq!(summary.counters.processed_files, 3);
        assert_eq!(summary.counters.total_dirs, 3);
        assert_eq!(summary.counters.processed_dirs, 3);
    }

    #[test]
    fn tiny_queues_fall_back_to_inline_walking() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        for i in 0..20 {
            let dir = root.join(format!("d{i}/nested"));
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(dir.join("f"), b"x").unwrap();
        }

        let journal = Journal::default();
        let counters = Arc::new(ProgressCounters::new());
        let options = WalkOptions {
            dir_workers: 1,
            file_workers: 1,
            dir_queue_capacity: 1,
            file_queue_capacity: 1,
            listing_retries: 0,
        };
        let summary = TreeWalker::new(&ReadDirLister, &journal, counters, options)
            .walk(root)
            .unwrap();
        assert_eq!(summary.counters.processed_files, 20);
        assert_eq!(summary.counters.processed_dirs, 41);
    }

    #[test]
    fn missing_root_is_fatal() {
        let journal = Journal::default();
        let counters = Arc::new(ProgressCounters::new());
        let walker = TreeWalker::new(&ReadDirLister, &journal, counters, WalkOptions::default());
        assert!(walker.walk(Path::new("/no/such/root/for/parfs")).is_err());
    }

    #[test]
    fn file_root_is_fatal() {
        let temp = tempfile::tempdir().unwrap();
        let file = temp.path().join("f");
        std::fs::write(&file, b"x").unwrap();
        let journal = Journal::default();
        let counters = Arc::new(ProgressCounters::new());
        let walker = TreeWalker::new(&ReadDirLister, &journal, counters, WalkOptions::default());
        assert!(walker.walk(&file).is_err());
    }
}
