use std::fs;
use std::path::Path;

use super::{FileOutcome, Operation};

/// Removes every file, then each directory once its subtree is gone.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeleteOp;

impl Operation for DeleteOp {
    fn name(&self) -> &'static str {
        "delete"
    }

    fn per_file(&self, path: &Path) -> FileOutcome {
        match fs::remove_file(path) {
            Ok(()) => FileOutcome::Done,
            Err(err) => {
                log::warn!("remove {}: {}", path.display(), err);
                FileOutcome::Failed
            }
        }
    }

    fn post_directory(&self, dir: &Path) {
        if let Err(err) = fs::remove_dir(dir) {
            log::warn!("remove directory {}: {}", dir.display(), err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;

    #[test]
    fn removes_files_and_links_without_following() {
        let temp = tempfile::tempdir().unwrap();
        let keep = temp.path().join("keep");
        fs::create_dir(&keep).unwrap();
        fs::write(keep.join("precious"), b"x").unwrap();
        let link = temp.path().join("link");
        symlink(&keep, &link).unwrap();

        assert_eq!(DeleteOp.per_file(&link), FileOutcome::Done);
        assert!(!link.exists());
        assert!(keep.join("precious").exists());
    }

    #[test]
    fn missing_file_is_a_failure_not_a_panic() {
        let temp = tempfile::tempdir().unwrap();
        assert_eq!(
            DeleteOp.per_file(&temp.path().join("gone")),
            FileOutcome::Failed
        );
    }

    #[test]
    fn post_directory_leaves_non_empty_directories() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join("d");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("f"), b"x").unwrap();

        DeleteOp.post_directory(&dir);
        assert!(dir.exists());

        fs::remove_file(dir.join("f")).unwrap();
        DeleteOp.post_directory(&dir);
        assert!(!dir.exists());
    }
}
