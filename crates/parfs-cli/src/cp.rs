use eyre::{bail, Context, Result};
use parfs_core::ops::{CopyContext, CopyOp};
use parfs_core::ProgressCounters;
use std::sync::Arc;

use crate::cli::CpArgs;
use crate::context::AppContext;
use crate::summary::print_summary;

pub fn run_cp(ctx: &AppContext, args: &CpArgs) -> Result<()> {
    if !args.source.is_dir() {
        bail!("source is not a directory: {}", args.source.display());
    }
    let copy_ctx = CopyContext::new(&args.source, &args.destination).with_context(|| {
        format!(
            "failed to copy from {} to {}",
            args.source.display(),
            args.destination.display()
        )
    })?;

    let (policy, striper) = ctx.striper(args.stripe.map(Into::into), copy_ctx.dest_root());
    let source_root = copy_ctx.source_root().to_path_buf();
    let counters = Arc::new(ProgressCounters::new());
    let op = CopyOp::new(copy_ctx, Arc::clone(&counters)).with_striping(policy, striper);

    let summary = ctx.run_walk("cp", &source_root, &op, counters)?;
    print_summary("Copy", &summary, true);
    Ok(())
}
