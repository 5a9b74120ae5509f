//! Stripe-count selection for large files on Lustre.
//!
//! Before a large destination file is created, its layout is set so the data
//! is spread over more OSTs. Three size bands above the small-file limit map
//! to three increasing stripe counts.

use eyre::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::fs_capability;

const GB: u64 = 1_000_000_000;

/// Size bands and the stripe count requested for each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StripePolicy {
    /// Files up to this size keep the filesystem's default layout.
    pub no_stripe_below: u64,
    /// Files below this size get `counts.0` stripes.
    pub medium_below: u64,
    /// Files below this size get `counts.1` stripes; larger get `counts.2`.
    pub wide_below: u64,
    pub counts: (u32, u32, u32),
}

impl Default for StripePolicy {
    fn default() -> Self {
        Self {
            no_stripe_below: 10 * GB,
            medium_below: 100 * GB,
            wide_below: 1000 * GB,
            counts: (5, 10, 50),
        }
    }
}

impl StripePolicy {
    /// Stripe count to request for a file of `size` bytes, if any.
    pub fn stripe_count(&self, size: u64) -> Option<u32> {
        if size <= self.no_stripe_below {
            None
        } else if size < self.medium_below {
            Some(self.counts.0)
        } else if size < self.wide_below {
            Some(self.counts.1)
        } else {
            Some(self.counts.2)
        }
    }
}

/// Applies a stripe layout to a not-yet-written destination path.
pub trait Striper: Send + Sync {
    fn set_stripe(&self, dest: &Path, count: u32) -> Result<()>;
}

/// Runs `lfs setstripe -c <count> <dest>`.
#[derive(Debug, Clone)]
pub struct LfsStriper {
    lfs_path: PathBuf,
}

impl LfsStriper {
    pub fn new(lfs_path: impl Into<PathBuf>) -> Self {
        Self {
            lfs_path: lfs_path.into(),
        }
    }
}

impl Striper for LfsStriper {
    fn set_stripe(&self, dest: &Path, count: u32) -> Result<()> {
        let output = Command::new(&self.lfs_path)
            .arg("setstripe")
            .arg("-c")
            .arg(count.to_string())
            .arg(dest)
            .output()
            .with_context(|| format!("running {} setstripe", self.lfs_path.display()))?;
        if !output.status.success() {
            bail!(
                "{} setstripe -c {} {} failed ({}): {}",
                self.lfs_path.display(),
                count,
                dest.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        log::info!("stripe count {} for {}", count, dest.display());
        Ok(())
    }
}

/// Leaves the default layout alone.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoStriping;

impl Striper for NoStriping {
    fn set_stripe(&self, _dest: &Path, _count: u32) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StripeMode {
    /// Stripe only when the destination is on Lustre.
    #[default]
    Auto,
    Always,
    Never,
}

pub fn select_striper(mode: StripeMode, dest_root: &Path, lfs_path: &Path) -> Box<dyn Striper> {
    let enabled = match mode {
        StripeMode::Auto => fs_capability::is_lustre(fs_capability::nearest_existing(dest_root)),
        StripeMode::Always => true,
        StripeMode::Never => false,
    };
    if enabled {
        Box::new(LfsStriper::new(lfs_path))
    } else {
        Box::new(NoStriping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bands() {
        let policy = StripePolicy::default();
        assert_eq!(policy.stripe_count(0), None);
        assert_eq!(policy.stripe_count(10 * GB), None);
        assert_eq!(policy.stripe_count(10 * GB + 1), Some(5));
        assert_eq!(policy.stripe_count(100 * GB - 1), Some(5));
        assert_eq!(policy.stripe_count(100 * GB), Some(10));
        assert_eq!(policy.stripe_count(1000 * GB - 1), Some(10));
        assert_eq!(policy.stripe_count(1000 * GB), Some(50));
    }

    #[test]
    fn failing_setstripe_is_an_error() {
        let temp = tempfile::tempdir().unwrap();
        let striper = LfsStriper::new("/bin/false");
        assert!(striper.set_stripe(&temp.path().join("out"), 5).is_err());
    }

    #[test]
    fn never_mode_does_not_stripe() {
        let temp = tempfile::tempdir().unwrap();
        let striper = select_striper(StripeMode::Never, temp.path(), Path::new("/bin/false"));
        assert!(striper.set_stripe(&temp.path().join("out"), 5).is_ok());
    }
}
