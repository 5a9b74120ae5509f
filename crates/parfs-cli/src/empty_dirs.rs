use eyre::Result;
use parfs_core::empty_dirs::EmptyDirIndex;
use parfs_core::ops::FindEmptyDirsOp;
use parfs_core::ProgressCounters;
use std::sync::Arc;

use crate::cli::EmptyDirsArgs;
use crate::context::AppContext;
use crate::summary::{print_empty_dirs, print_summary};

pub fn run_empty_dirs(ctx: &AppContext, args: &EmptyDirsArgs) -> Result<()> {
    let index = Arc::new(EmptyDirIndex::new());
    let op = FindEmptyDirsOp::new(Arc::clone(&index), args.threshold);
    let counters = Arc::new(ProgressCounters::new());
    let summary = ctx.run_walk("empty-dirs", &args.path, &op, counters)?;

    let top = args.top.unwrap_or(ctx.settings.report.top);
    let limit = (top > 0).then_some(top);
    let rows = index.ranked(limit);

    print_summary("Search", &summary, false);
    println!(
        "{} director{} under {} with at most {} file(s):",
        index.len(),
        if index.len() == 1 { "y" } else { "ies" },
        summary.root.display(),
        args.threshold
    );
    print_empty_dirs(&rows);
    Ok(())
}
