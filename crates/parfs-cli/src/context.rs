use eyre::Result;
use parfs_core::config::Settings;
use parfs_core::stripe::{select_striper, StripeMode, StripePolicy, Striper};
use parfs_core::{
    select_lister, ListerKind, Operation, ProgressCounters, TreeWalker, WalkOptions, WalkSummary,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::cli::Cli;
use crate::progress::Reporter;

/// Settings file merged with command-line overrides.
#[derive(Debug, Clone)]
pub struct AppContext {
    pub settings: Settings,
    pub walk: WalkOptions,
    pub lister: ListerKind,
    pub interval: Duration,
    pub progress: bool,
}

impl AppContext {
    pub fn load(cli: &Cli) -> Result<Self> {
        let settings = Settings::discover(cli.config.as_deref())?;
        Ok(Self::merge(cli, settings))
    }

    fn merge(cli: &Cli, settings: Settings) -> Self {
        let defaults = WalkOptions::default();
        let walk = WalkOptions {
            dir_workers: cli
                .dir_workers
                .or(settings.workers.dirs)
                .unwrap_or(defaults.dir_workers)
                .max(1),
            file_workers: cli
                .file_workers
                .or(settings.workers.files)
                .unwrap_or(defaults.file_workers)
                .max(1),
            ..defaults
        };
        let lister = cli
            .lister
            .map(ListerKind::from)
            .unwrap_or_else(|| settings.lustre.lister.into());
        let interval =
            Duration::from_millis(cli.interval_ms.unwrap_or(settings.report.interval_ms).max(50));

        Self {
            walk,
            lister,
            interval,
            progress: !cli.no_progress,
            settings,
        }
    }

    pub fn striper(&self, mode: Option<StripeMode>, dest_root: &Path) -> (StripePolicy, Box<dyn Striper>) {
        let mode = mode.unwrap_or_else(|| self.settings.lustre.stripe.into());
        (
            StripePolicy::default(),
            select_striper(mode, dest_root, &self.settings.lustre.lfs_path),
        )
    }

    /// Walk `root` with `op`, showing progress while it runs.
    pub fn run_walk(
        &self,
        label: &'static str,
        root: &Path,
        op: &dyn Operation,
        counters: Arc<ProgressCounters>,
    ) -> Result<WalkSummary> {
        let lister = select_lister(self.lister, root, &self.settings.lustre.lfs_path);
        let reporter = if self.progress {
            Some(Reporter::start(label, Arc::clone(&counters), self.interval)?)
        } else {
            None
        };

        let result = TreeWalker::new(lister.as_ref(), op, counters, self.walk.clone()).walk(root);

        if let Some(reporter) = reporter {
            reporter.stop();
        }
        result
    }
}
