use eyre::Result;
use parfs_core::ops::CountOp;
use parfs_core::ProgressCounters;
use std::sync::Arc;

use crate::cli::CountArgs;
use crate::context::AppContext;
use crate::summary::print_summary;

pub fn run_count(ctx: &AppContext, args: &CountArgs) -> Result<()> {
    let counters = Arc::new(ProgressCounters::new());
    let op = CountOp::new(Arc::clone(&counters), args.bytes);
    let summary = ctx.run_walk("count", &args.path, &op, counters)?;
    print_summary("Count", &summary, args.bytes);
    Ok(())
}
