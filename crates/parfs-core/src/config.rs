use directories::{BaseDirs, ProjectDirs};
use eyre::{eyre, Context, Result};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::listing::ListerKind;
use crate::stripe::StripeMode;

/// File name looked up inside the configuration directory.
pub const SETTINGS_FILE: &str = "parfs.toml";

static CONFIG_DIR_OVERRIDE: Lazy<RwLock<Option<PathBuf>>> = Lazy::new(|| RwLock::new(None));

/// Override the configuration directory for the current process.
/// Subsequent calls replace the previous override.
pub fn set_config_dir<P: AsRef<Path>>(path: P) {
    *CONFIG_DIR_OVERRIDE.write() = Some(path.as_ref().to_path_buf());
}

/// Clear any previously configured override.
pub fn clear_config_dir_override() {
    CONFIG_DIR_OVERRIDE.write().take();
}

/// Resolve the configuration directory.
/// Priority: explicit override -> platform standard -> ~/.config/parfs
pub fn config_dir() -> Result<PathBuf> {
    if let Some(path) = CONFIG_DIR_OVERRIDE.read().clone() {
        return Ok(path);
    }

    if let Some(proj) = ProjectDirs::from("org", "parfs", "parfs") {
        return Ok(proj.config_dir().to_path_buf());
    }

    if let Some(base) = BaseDirs::new() {
        return Ok(base.home_dir().join(".config").join("parfs"));
    }

    Err(eyre!(
        "unable to determine configuration directory for parfs (no override and no platform default)"
    ))
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub workers: WorkerSection,
    pub lustre: LustreSection,
    pub report: ReportSection,
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct WorkerSection {
    /// Threads processing file entries
    pub files: Option<usize>,
    /// Threads listing directories
    pub dirs: Option<usize>,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct LustreSection {
    /// Path of the `lfs` utility
    pub lfs_path: PathBuf,
    pub lister: ListerSetting,
    pub stripe: StripeSetting,
}

impl Default for LustreSection {
    fn default() -> Self {
        Self {
            lfs_path: PathBuf::from("lfs"),
            lister: ListerSetting::Auto,
            stripe: StripeSetting::Auto,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ListerSetting {
    #[default]
    Auto,
    Readdir,
    Lfs,
}

impl From<ListerSetting> for ListerKind {
    fn from(value: ListerSetting) -> Self {
        match value {
            ListerSetting::Auto => ListerKind::Auto,
            ListerSetting::Readdir => ListerKind::ReadDir,
            ListerSetting::Lfs => ListerKind::Lfs,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum StripeSetting {
    #[default]
    Auto,
    Always,
    Never,
}

impl From<StripeSetting> for StripeMode {
    fn from(value: StripeSetting) -> Self {
        match value {
            StripeSetting::Auto => StripeMode::Auto,
            StripeSetting::Always => StripeMode::Always,
            StripeSetting::Never => StripeMode::Never,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ReportSection {
    /// Status refresh interval in milliseconds
    pub interval_ms: u64,
    /// Rows printed by `empty-dirs`
    pub top: usize,
}

impl Default for ReportSection {
    fn default() -> Self {
        Self {
            interval_ms: 2000,
            top: 20,
        }
    }
}

impl Settings {
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).wrap_err("failed to parse settings")
    }

    /// Read settings from `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read settings file: {}", path.display()))?;
        Self::parse(&content).wrap_err_with(|| format!("in {}", path.display()))
    }

    /// Load an explicit file, or `parfs.toml` from the configuration
    /// directory when it exists, or defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let candidate = match config_dir() {
            Ok(dir) => dir.join(SETTINGS_FILE),
            Err(err) => {
                log::debug!("no configuration directory: {err}");
                return Ok(Self::default());
            }
        };
        if candidate.is_file() {
            Self::load(&candidate)
        } else {
            Ok(Self::default())
        }
    }
}
