//! Single-level directory listing.
//!
//! A lister returns the immediate children of one directory, split into
//! subdirectories and everything else. Symlinks are never followed, so a link
//! to a directory is reported as a file entry.

use std::ffi::OsString;
use std::fs;
use std::io::{self, BufRead, BufReader, Read};
use std::os::unix::ffi::OsStringExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

use crate::fs_capability;

/// Immediate children of one directory.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Listing {
    pub dirs: Vec<PathBuf>,
    pub files: Vec<PathBuf>,
}

impl Listing {
    pub fn len(&self) -> usize {
        self.dirs.len() + self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty() && self.files.is_empty()
    }
}

/// Source of directory listings. Paths in the result are absolute when `dir` is.
pub trait EntryLister: Send + Sync {
    fn list(&self, dir: &Path) -> io::Result<Listing>;
}

/// Native `readdir` enumeration.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReadDirLister;

impl EntryLister for ReadDirLister {
    fn list(&self, dir: &Path) -> io::Result<Listing> {
        let mut listing = Listing::default();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                listing.dirs.push(path);
            } else {
                listing.files.push(path);
            }
        }
        Ok(listing)
    }
}

/// Delegates listing to `lfs find`, which answers from the Lustre MDS without
/// touching the OSTs.
#[derive(Debug, Clone)]
pub struct LfsFindLister {
    lfs_path: PathBuf,
}

impl LfsFindLister {
    pub fn new(lfs_path: impl Into<PathBuf>) -> Self {
        Self {
            lfs_path: lfs_path.into(),
        }
    }

    fn find(&self, dir: &Path, type_args: &[&str]) -> io::Result<Vec<PathBuf>> {
        let mut child = Command::new(&self.lfs_path)
            .arg("find")
            .arg(dir)
            .args(["-maxdepth", "1"])
            .args(type_args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // Drain stderr concurrently so a chatty child cannot block on a full pipe.
        let stderr = child.stderr.take();
        let stderr_reader = thread::spawn(move || {
            let mut buf = String::new();
            if let Some(mut stderr) = stderr {
                let _ = stderr.read_to_string(&mut buf);
            }
            buf
        });

        // Names are raw bytes; a non-UTF-8 name is still a valid entry.
        let mut paths = Vec::new();
        let mut read_error = None;
        if let Some(stdout) = child.stdout.take() {
            for line in BufReader::new(stdout).split(b'\n') {
                match line {
                    Ok(bytes) if bytes.is_empty() => {}
                    Ok(bytes) => {
                        let path = PathBuf::from(OsString::from_vec(bytes));
                        if path != dir {
                            paths.push(path);
                        }
                    }
                    Err(err) => {
                        read_error = Some(err);
                        break;
                    }
                }
            }
        }

        if read_error.is_some() {
            let _ = child.kill();
        }
        let status = child.wait()?;
        let stderr = stderr_reader.join().unwrap_or_default();
        if let Some(err) = read_error {
            return Err(err);
        }
        if !status.success() {
            return Err(io::Error::other(format!(
                "{} find {} exited with {}: {}",
                self.lfs_path.display(),
                dir.display(),
                status,
                stderr.trim()
            )));
        }
        Ok(paths)
    }
}

impl Default for LfsFindLister {
    fn default() -> Self {
        Self::new("lfs")
    }
}

impl EntryLister for LfsFindLister {
    fn list(&self, dir: &Path) -> io::Result<Listing> {
        let dirs = self.find(dir, &["-type", "d"])?;
        let files = self.find(dir, &["!", "-type", "d"])?;
        Ok(Listing { dirs, files })
    }
}

/// Which lister to use for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListerKind {
    /// `lfs find` on Lustre, `readdir` elsewhere.
    #[default]
    Auto,
    ReadDir,
    Lfs,
}

/// Build the lister for `root`, resolving `Auto` by probing its filesystem.
pub fn select_lister(kind: ListerKind, root: &Path, lfs_path: &Path) -> Box<dyn EntryLister> {
    let use_lfs = match kind {
        ListerKind::Auto => fs_capability::is_lustre(root),
        ListerKind::ReadDir => false,
        ListerKind::Lfs => true,
    };
    if use_lfs {
        log::info!("listing through {} find", lfs_path.display());
        Box::new(LfsFindLister::new(lfs_path))
    } else {
        Box::new(ReadDirLister)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;

    #[test]
    fn readdir_splits_dirs_and_files() -> io::Result<()> {
        let temp = tempfile::tempdir()?;
        let base = temp.path();
        fs::create_dir(base.join("sub"))?;
        fs::write(base.join("a.txt"), b"a")?;
        symlink(base.join("sub"), base.join("link-to-sub"))?;

        let mut listing = ReadDirLister.list(base)?;
        listing.files.sort();

        assert_eq!(listing.dirs, vec![base.join("sub")]);
        assert_eq!(
            listing.files,
            vec![base.join("a.txt"), base.join("link-to-sub")]
        );
        assert!(!listing.dirs.iter().any(|d| d == base));
        Ok(())
    }

    #[test]
    fn readdir_missing_directory_errors() {
        let err = ReadDirLister
            .list(Path::new("/no/such/dir/for/parfs"))
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn lfs_lister_reports_spawn_failure() {
        let lister = LfsFindLister::new("/nonexistent/bin/lfs");
        assert!(lister.list(Path::new("/tmp")).is_err());
    }

    #[test]
    fn lfs_lister_parses_find_output() -> io::Result<()> {
        // `env find ...` takes the same arguments as `lfs find ...`.
        let temp = tempfile::tempdir()?;
        let tree = temp.path().join("tree");
        fs::create_dir_all(tree.join("d1"))?;
        fs::write(tree.join("f1"), b"1")?;

        let listing = LfsFindLister::new("/usr/bin/env").list(&tree)?;
        assert_eq!(listing.dirs, vec![tree.join("d1")]);
        assert_eq!(listing.files, vec![tree.join("f1")]);
        Ok(())
    }

    #[test]
    fn lfs_lister_keeps_non_utf8_names() -> io::Result<()> {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let temp = tempfile::tempdir()?;
        let tree = temp.path().join("tree");
        fs::create_dir(&tree)?;
        let odd = tree.join(OsStr::from_bytes(b"bad\xffname"));
        fs::write(&odd, b"x")?;
        fs::write(tree.join("good"), b"y")?;

        let mut native = ReadDirLister.list(&tree)?;
        let mut delegated = LfsFindLister::new("/usr/bin/env").list(&tree)?;
        native.files.sort();
        delegated.files.sort();

        assert_eq!(delegated.files.len(), 2);
        assert!(delegated.files.contains(&odd));
        assert_eq!(delegated, native);
        Ok(())
    }

    #[test]
    fn explicit_kinds_are_honoured() {
        let temp = tempfile::tempdir().unwrap();
        let lister = select_lister(ListerKind::ReadDir, temp.path(), Path::new("lfs"));
        assert!(lister.list(temp.path()).unwrap().is_empty());
    }
}
