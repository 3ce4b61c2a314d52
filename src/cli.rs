//! CLI command definitions using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use regsync_reconciler::UndeletePolicy;

/// regsync - pipeline registry reconciler
#[derive(Parser, Debug)]
#[command(name = "regsync")]
#[command(version)]
#[command(about = "Keeps an external pipeline registry in sync with a configuration feed")]
#[command(
    long_about = "regsync polls the configuration backend for workspace snapshots, diffs each one against the last applied snapshot and pushes the resulting PUT/DELETE calls to the pipeline registry."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Poll the configuration backend and reconcile until Ctrl+C
    Run {
        /// TOML settings file (environment variables still override it)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print the actions that would bring `previous` to `current`, as JSON
    Diff {
        /// Snapshot to reconcile towards
        #[arg(long)]
        current: PathBuf,

        /// Last applied snapshot; omit for a first pass
        #[arg(long)]
        previous: Option<PathBuf>,

        /// Source category that takes part in syncing
        #[arg(long, default_value = regsync_reconciler::DEFAULT_SYNCABLE_CATEGORY)]
        category: String,

        /// How a `deleted` flag flipping back to false is handled
        #[arg(long, value_enum, default_value_t = UndeleteArg::Remove)]
        undelete: UndeleteArg,
    },
}

/// Command-line form of [`UndeletePolicy`].
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndeleteArg {
    /// Remove the pipeline on any flip of the flag
    Remove,
    /// Treat an un-deleted pair as new
    Reapply,
}

impl From<UndeleteArg> for UndeletePolicy {
    fn from(arg: UndeleteArg) -> Self {
        match arg {
            UndeleteArg::Remove => Self::Remove,
            UndeleteArg::Reapply => Self::Reapply,
        }
    }
}
