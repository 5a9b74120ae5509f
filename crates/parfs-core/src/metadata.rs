//! Metadata access and attribute fix-ups (Unix).

use eyre::{Context, Result};
use filetime::FileTime;
use std::fs::{self, Permissions};
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};

/// Permission bits carried over by chmod (rwx for u/g/o plus setuid/setgid/sticky).
pub const PERMISSION_BITS: u32 = 0o7777;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    Regular,
    Directory,
    Symlink { target: PathBuf },
    /// FIFO, socket, block or character device.
    Other,
}

/// Metadata for a single path, captured without following symlinks.
#[derive(Debug, Clone)]
pub struct EntryMetadata {
    pub size: u64,
    /// Full `st_mode`, file type bits included.
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub mtime: FileTime,
    pub atime: FileTime,
    pub kind: EntryKind,
}

impl EntryMetadata {
    /// lstat `path`; the link target is read only for symlinks.
    pub fn lstat(path: &Path) -> Result<Self> {
        let md = fs::symlink_metadata(path)
            .with_context(|| format!("lstat {}", path.display()))?;
        let file_type = md.file_type();
        let kind = if file_type.is_symlink() {
            let target = fs::read_link(path)
                .with_context(|| format!("readlink {}", path.display()))?;
            EntryKind::Symlink { target }
        } else if file_type.is_dir() {
            EntryKind::Directory
        } else if file_type.is_file() {
            EntryKind::Regular
        } else {
            EntryKind::Other
        };

        Ok(Self {
            size: md.len(),
            mode: md.mode(),
            uid: md.uid(),
            gid: md.gid(),
            mtime: FileTime::from_last_modification_time(&md),
            atime: FileTime::from_last_access_time(&md),
            kind,
        })
    }

    /// Like [`EntryMetadata::lstat`], but a missing path is `Ok(None)`.
    pub fn lstat_if_exists(path: &Path) -> Result<Option<Self>> {
        match fs::symlink_metadata(path) {
            Ok(_) => Self::lstat(path).map(Some),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("lstat {}", path.display())),
        }
    }

    pub fn permissions(&self) -> u32 {
        self.mode & PERMISSION_BITS
    }

    pub fn is_regular(&self) -> bool {
        self.kind == EntryKind::Regular
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    pub fn same_owner(&self, other: &EntryMetadata) -> bool {
        self.uid == other.uid && self.gid == other.gid
    }

    /// Size, mode and mtime all match: the copy fast path.
    pub fn matches_content_of(&self, other: &EntryMetadata) -> bool {
        self.size == other.size && self.mode == other.mode && self.mtime == other.mtime
    }
}

/// lchown `path` to `uid`:`gid`. Does not follow symlinks.
pub fn set_owner(path: &Path, uid: u32, gid: u32) -> Result<()> {
    std::os::unix::fs::lchown(path, Some(uid), Some(gid))
        .with_context(|| format!("chown {}:{} {}", uid, gid, path.display()))
}

/// chmod `path` to the permission bits of `mode`.
pub fn set_mode(path: &Path, mode: u32) -> Result<()> {
    fs::set_permissions(path, Permissions::from_mode(mode & PERMISSION_BITS))
        .with_context(|| format!("chmod {:o} {}", mode & PERMISSION_BITS, path.display()))
}

pub fn set_times(path: &Path, atime: FileTime, mtime: FileTime) -> Result<()> {
    filetime::set_file_times(path, atime, mtime)
        .with_context(|| format!("set times {}", path.display()))
}
