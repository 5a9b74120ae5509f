mod cli;
mod context;
mod count;
mod cp;
mod empty_dirs;
mod progress;
mod rm;
mod summary;

use clap::Parser;
use eyre::Result;

use crate::cli::{Cli, Commands};
use crate::context::AppContext;

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let ctx = AppContext::load(&cli)?;

    match &cli.command {
        Commands::Count(args) => count::run_count(&ctx, args)?,
        Commands::Rm(args) => rm::run_rm(&ctx, args)?,
        Commands::Cp(args) => cp::run_cp(&ctx, args)?,
        Commands::EmptyDirs(args) => empty_dirs::run_empty_dirs(&ctx, args)?,
    }

    Ok(())
}

/// `warn` by default, one step louder per `-v`. `RUST_LOG` wins when set.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level).format_timestamp(None);
    if let Ok(spec) = std::env::var("RUST_LOG") {
        builder.parse_filters(&spec);
    }
    builder.init();
}
