use eyre::{bail, Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::fs::{symlink, OpenOptionsExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{FileOutcome, Operation};
use crate::counters::ProgressCounters;
use crate::fs_capability;
use crate::metadata::{set_mode, set_owner, set_times, EntryKind, EntryMetadata};
use crate::stripe::{NoStriping, StripePolicy, Striper};

/// Size of the buffer each file worker streams through.
pub const COPY_BUFFER_SIZE: usize = 1024 * 1024;

/// Source and destination roots of a copy run.
#[derive(Debug, Clone)]
pub struct CopyContext {
    source_root: PathBuf,
    dest_root: PathBuf,
}

impl CopyContext {
    /// Both roots are made absolute. A symlinked source root is refused, as is
    /// a destination inside the source, whether named directly or reached
    /// through a symlink.
    pub fn new(source_root: &Path, dest_root: &Path) -> Result<Self> {
        let source_root = std::path::absolute(source_root)
            .with_context(|| format!("resolving {}", source_root.display()))?;
        let dest_root = std::path::absolute(dest_root)
            .with_context(|| format!("resolving {}", dest_root.display()))?;
        if fs::symlink_metadata(&source_root).is_ok_and(|md| md.file_type().is_symlink()) {
            bail!(
                "{} is a symbolic link; pass the directory it points to",
                source_root.display()
            );
        }
        if dest_root.starts_with(&source_root) || resolves_inside(&dest_root, &source_root) {
            bail!(
                "refusing to copy {} into itself ({})",
                source_root.display(),
                dest_root.display()
            );
        }
        Ok(Self {
            source_root,
            dest_root,
        })
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    pub fn dest_root(&self) -> &Path {
        &self.dest_root
    }

    /// `dest_root + (path relative to source_root)`.
    pub fn dest_for(&self, path: &Path) -> Result<PathBuf> {
        let rel = path.strip_prefix(&self.source_root).with_context(|| {
            format!(
                "{} is outside the source root {}",
                path.display(),
                self.source_root.display()
            )
        })?;
        if rel.as_os_str().is_empty() {
            Ok(self.dest_root.clone())
        } else {
            Ok(self.dest_root.join(rel))
        }
    }
}

/// Whether `dest`, with symlinks in its existing ancestors resolved, lies
/// inside `source`. Paths that cannot be resolved are not inside.
fn resolves_inside(dest: &Path, source: &Path) -> bool {
    let Ok(real_source) = fs::canonicalize(source) else {
        return false;
    };
    let anchor = fs_capability::nearest_existing(dest);
    let Ok(real_anchor) = fs::canonicalize(anchor) else {
        return false;
    };
    let pending = dest.strip_prefix(anchor).unwrap_or(Path::new(""));
    real_anchor.join(pending).starts_with(real_source)
}

/// Metadata-preserving copy with a size/mode/mtime fast path.
pub struct CopyOp {
    ctx: CopyContext,
    counters: Arc<ProgressCounters>,
    policy: StripePolicy,
    striper: Box<dyn Striper>,
}

impl CopyOp {
    pub fn new(ctx: CopyContext, counters: Arc<ProgressCounters>) -> Self {
        Self {
            ctx,
            counters,
            policy: StripePolicy::default(),
            striper: Box::new(NoStriping),
        }
    }

    pub fn with_striping(mut self, policy: StripePolicy, striper: Box<dyn Striper>) -> Self {
        self.policy = policy;
        self.striper = striper;
        self
    }

    fn copy_regular(&self, src: &Path, dest: &Path, meta: &EntryMetadata) -> Result<FileOutcome> {
        if let Some(existing) = EntryMetadata::lstat_if_exists(dest)? {
            if existing.is_regular() && existing.matches_content_of(meta) {
                return Ok(FileOutcome::Unchanged);
            }
            fs::remove_file(dest)
                .with_context(|| format!("removing stale {}", dest.display()))?;
            log::warn!("{} exists and is modified, replacing", dest.display());
        }

        let reader =
            File::open(src).with_context(|| format!("opening source {}", src.display()))?;

        if let Some(count) = self.policy.stripe_count(meta.size) {
            self.striper.set_stripe(dest, count)?;
        }

        let writer = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(meta.permissions())
            .open(dest)
            .with_context(|| format!("creating {}", dest.display()))?;

        let copied = self
            .stream(reader, writer)
            .with_context(|| format!("copying {} to {}", src.display(), dest.display()))?;
        log::debug!("copied {} ({} bytes)", dest.display(), copied);

        self.fix_attributes(dest, meta);
        Ok(FileOutcome::Done)
    }

    fn stream(&self, mut reader: File, mut writer: File) -> io::Result<u64> {
        let mut buf = vec![0u8; COPY_BUFFER_SIZE];
        let mut total = 0u64;
        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            };
            writer.write_all(&buf[..n])?;
            self.counters.add_bytes(n as u64);
            total += n as u64;
        }
        writer.flush()?;
        Ok(total)
    }

    /// Owner, then mode (chown may clear setuid bits), then times.
    /// Each step is attempted even when an earlier one fails.
    fn fix_attributes(&self, dest: &Path, meta: &EntryMetadata) {
        if let Err(err) = set_owner(dest, meta.uid, meta.gid) {
            log::warn!("{:#}", err);
        }
        if let Err(err) = set_mode(dest, meta.mode) {
            log::warn!("{:#}", err);
        }
        if let Err(err) = set_times(dest, meta.atime, meta.mtime) {
            log::warn!("{:#}", err);
        }
    }

    fn copy_symlink(&self, dest: &Path, target: &Path, meta: &EntryMetadata) -> Result<FileOutcome> {
        if let Some(existing) = EntryMetadata::lstat_if_exists(dest)? {
            if let EntryKind::Symlink {
                target: existing_target,
            } = &existing.kind
            {
                if existing_target == target {
                    return Ok(FileOutcome::Unchanged);
                }
            }
            fs::remove_file(dest)
                .with_context(|| format!("removing stale {}", dest.display()))?;
        }

        symlink(target, dest).with_context(|| {
            format!("creating symlink {} -> {}", dest.display(), target.display())
        })?;
        if let Err(err) = set_owner(dest, meta.uid, meta.gid) {
            log::warn!("{:#}", err);
        }
        Ok(FileOutcome::Done)
    }
}

impl Operation for CopyOp {
    fn name(&self) -> &'static str {
        "copy"
    }

    /// Create or reconcile the destination directory. It is kept owner-writable
    /// until `post_directory` applies the exact source mode.
    fn prepare_directory(&self, dir: &Path) -> Result<()> {
        let dest = self.ctx.dest_for(dir)?;
        let src_meta = EntryMetadata::lstat(dir)?;
        let working_mode = src_meta.permissions() | 0o700;

        match EntryMetadata::lstat_if_exists(&dest)? {
            Some(existing) => {
                if !existing.is_dir() {
                    bail!("{} exists and is not a directory", dest.display());
                }
                if existing.permissions() != working_mode {
                    set_mode(&dest, working_mode)?;
                }
                if !existing.same_owner(&src_meta) {
                    if let Err(err) = set_owner(&dest, src_meta.uid, src_meta.gid) {
                        log::warn!("{:#}", err);
                    }
                }
            }
            None => {
                let created = if dir == self.ctx.source_root() {
                    fs::create_dir_all(&dest)
                } else {
                    fs::create_dir(&dest)
                };
                created.with_context(|| format!("creating directory {}", dest.display()))?;
                set_mode(&dest, working_mode)?;
                if let Err(err) = set_owner(&dest, src_meta.uid, src_meta.gid) {
                    log::warn!("{:#}", err);
                }
            }
        }
        Ok(())
    }

    fn per_file(&self, path: &Path) -> FileOutcome {
        let meta = match EntryMetadata::lstat(path) {
            Ok(meta) => meta,
            Err(err) => {
                log::warn!("reading source metadata: {:#}", err);
                return FileOutcome::Failed;
            }
        };
        let dest = match self.ctx.dest_for(path) {
            Ok(dest) => dest,
            Err(err) => {
                log::warn!("{:#}", err);
                return FileOutcome::Failed;
            }
        };

        let result = match &meta.kind {
            EntryKind::Regular => self.copy_regular(path, &dest, &meta),
            EntryKind::Symlink { target } => self.copy_symlink(&dest, target, &meta),
            EntryKind::Directory => {
                log::warn!("{} became a directory after listing, skipped", path.display());
                Ok(FileOutcome::Skipped)
            }
            EntryKind::Other => {
                log::warn!(
                    "{} is not a regular file or symlink (mode {:o}), skipped",
                    path.display(),
                    meta.mode
                );
                Ok(FileOutcome::Skipped)
            }
        };

        result.unwrap_or_else(|err| {
            log::warn!("copy {}: {:#}", path.display(), err);
            FileOutcome::Failed
        })
    }

    fn post_directory(&self, dir: &Path) {
        let finalize = || -> Result<()> {
            let dest = self.ctx.dest_for(dir)?;
            let src_meta = EntryMetadata::lstat(dir)?;
            set_mode(&dest, src_meta.mode)?;
            set_times(&dest, src_meta.atime, src_meta.mtime)
        };
        if let Err(err) = finalize() {
            log::warn!("finalizing directory for {}: {:#}", dir.display(), err);
        }
    }

    /// Drop the owner-write bit added by `prepare_directory`; times are left
    /// alone since the subtree is incomplete.
    fn directory_aborted(&self, dir: &Path) {
        let restore = || -> Result<()> {
            let dest = self.ctx.dest_for(dir)?;
            match EntryMetadata::lstat_if_exists(&dest)? {
                Some(existing) if existing.is_dir() => {
                    let src_meta = EntryMetadata::lstat(dir)?;
                    set_mode(&dest, src_meta.mode)
                }
                _ => Ok(()),
            }
        };
        if let Err(err) = restore() {
            log::warn!("restoring mode for {}: {:#}", dir.display(), err);
        }
    }
}
