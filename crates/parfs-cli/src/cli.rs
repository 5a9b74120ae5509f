use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use parfs_core::stripe::StripeMode;
use parfs_core::ListerKind;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "parfs")]
#[command(about = "Parallel count, copy, delete and empty-directory search for large file trees")]
#[command(after_help = "Run '<command> --help' for detailed options on each command.")]
pub struct Cli {
    /// Settings file to use instead of the default parfs.toml
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
    /// Threads processing files
    #[arg(long, global = true, value_name = "N")]
    pub file_workers: Option<usize>,
    /// Threads listing directories
    #[arg(long, global = true, value_name = "N")]
    pub dir_workers: Option<usize>,
    /// How directories are listed
    #[arg(long, global = true, value_enum)]
    pub lister: Option<ListerArg>,
    /// Progress refresh interval in milliseconds
    #[arg(long, global = true, value_name = "MS")]
    pub interval_ms: Option<u64>,
    /// Do not show the progress line
    #[arg(long, global = true)]
    pub no_progress: bool,
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Count files and directories under a path
    #[command(visible_alias = "scan")]
    Count(CountArgs),
    /// Delete a directory tree (confirmation required unless --yes)
    #[command(visible_alias = "delete")]
    Rm(RmArgs),
    /// Copy a directory tree, preserving ownership, permissions and times
    #[command(visible_alias = "copy")]
    Cp(CpArgs),
    /// List directories holding few or no files
    #[command(visible_alias = "find-empty-dirs")]
    EmptyDirs(EmptyDirsArgs),
}

#[derive(Args, Clone, Debug)]
pub struct CountArgs {
    /// Directory to count
    pub path: PathBuf,
    /// Also sum file sizes
    #[arg(long)]
    pub bytes: bool,
}

#[derive(Args, Clone, Debug)]
pub struct RmArgs {
    /// Directory to delete, itself included
    pub path: PathBuf,
    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

#[derive(Args, Clone, Debug)]
pub struct CpArgs {
    /// Source directory
    pub source: PathBuf,
    /// Destination directory (created if missing)
    pub destination: PathBuf,
    /// Stripe large files on the destination
    #[arg(long, value_enum)]
    pub stripe: Option<StripeArg>,
}

#[derive(Args, Clone, Debug)]
pub struct EmptyDirsArgs {
    /// Directory to search
    pub path: PathBuf,
    /// Report directories with at most this many files
    #[arg(long, default_value_t = 0)]
    pub threshold: u64,
    /// Rows to print (0 = all)
    #[arg(long)]
    pub top: Option<usize>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListerArg {
    Auto,
    Readdir,
    Lfs,
}

impl From<ListerArg> for ListerKind {
    fn from(value: ListerArg) -> Self {
        match value {
            ListerArg::Auto => ListerKind::Auto,
            ListerArg::Readdir => ListerKind::ReadDir,
            ListerArg::Lfs => ListerKind::Lfs,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum StripeArg {
    Auto,
    Always,
    Never,
}

impl From<StripeArg> for StripeMode {
    fn from(value: StripeArg) -> Self {
        match value {
            StripeArg::Auto => StripeMode::Auto,
            StripeArg::Always => StripeMode::Always,
            StripeArg::Never => StripeMode::Never,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn aliases_and_global_flags_parse() {
        let cli = Cli::try_parse_from([
            "parfs",
            "find-empty-dirs",
            "/data",
            "--threshold",
            "1",
            "--file-workers",
            "8",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.file_workers, Some(8));
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::EmptyDirs(args) => {
                assert_eq!(args.threshold, 1);
                assert_eq!(args.top, None);
            }
            _ => panic!("expected empty-dirs"),
        }
    }

    #[test]
    fn copy_takes_source_and_destination() {
        let cli = Cli::try_parse_from(["parfs", "copy", "a", "b", "--stripe", "never"]).unwrap();
        match cli.command {
            Commands::Cp(args) => {
                assert_eq!(args.source, PathBuf::from("a"));
                assert_eq!(args.destination, PathBuf::from("b"));
                assert_eq!(args.stripe, Some(StripeArg::Never));
            }
            _ => panic!("expected cp"),
        }
    }
}
