//! Filesystem detection used to pick listing and striping backends.

use std::path::Path;

/// `LL_SUPER_MAGIC` reported by statfs(2) on a Lustre client mount.
pub const LUSTRE_SUPER_MAGIC: u64 = 0x0BD0_0BD0;

/// Kind of filesystem a path lives on, as far as this tool cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilesystemKind {
    Lustre,
    Other,
}

/// Detect the filesystem backing `path`. Any detection failure reports `Other`.
pub fn filesystem_kind(path: &Path) -> FilesystemKind {
    match statfs_magic(path) {
        Some(LUSTRE_SUPER_MAGIC) => FilesystemKind::Lustre,
        _ => FilesystemKind::Other,
    }
}

pub fn is_lustre(path: &Path) -> bool {
    filesystem_kind(path) == FilesystemKind::Lustre
}

/// Closest ancestor of `path` (itself included) that exists, for probing a
/// destination that has not been created yet.
pub fn nearest_existing(path: &Path) -> &Path {
    path.ancestors()
        .find(|candidate| candidate.symlink_metadata().is_ok())
        .unwrap_or(path)
}

#[cfg(target_os = "linux")]
#[allow(clippy::unnecessary_cast)]
fn statfs_magic(path: &Path) -> Option<u64> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes()).ok()?;
    let mut stat: libc::statfs = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::statfs(c_path.as_ptr(), &mut stat) };
    if rc != 0 {
        log::debug!(
            "statfs {} failed: {}",
            path.display(),
            std::io::Error::last_os_error()
        );
        return None;
    }
    Some(stat.f_type as u64)
}

#[cfg(not(target_os = "linux"))]
fn statfs_magic(_path: &Path) -> Option<u64> {
    None
}
