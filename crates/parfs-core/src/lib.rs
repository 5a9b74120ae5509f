pub mod config;
pub mod counters;
pub mod empty_dirs;
pub mod errors;
pub mod fs_capability;
pub mod listing;
pub mod metadata;
pub mod ops;
pub mod stripe;
pub mod walker;

pub use counters::{CounterSnapshot, ProgressCounters};
pub use listing::{select_lister, EntryLister, ListerKind};
pub use ops::{FileOutcome, Operation};
pub use walker::{TreeWalker, WalkOptions, WalkSummary};
