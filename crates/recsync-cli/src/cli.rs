//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::commands::{delete, fetch, flush, pending, reset, upload};

/// Explore a record service through the recsync offline sync engine.
#[derive(Parser, Debug)]
#[command(name = "recsync")]
#[command(author, version = env!("RECSYNC_VERSION"), about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Flags shared by every subcommand.
#[derive(clap::Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Record service URL (https://..., or file:///path for a local directory)
    #[arg(long, env = "RECSYNC_SERVICE", global = true)]
    pub service: Option<String>,

    /// Directory holding the pending upload and deletion queues
    #[arg(long, env = "RECSYNC_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Behave as if there were no network connectivity
    #[arg(long, global = true)]
    pub offline: bool,

    /// Fail instead of queuing when offline
    #[arg(long, global = true)]
    pub no_offline_support: bool,

    /// Records per page
    #[arg(long, default_value_t = recsync::DEFAULT_INTERVAL, global = true)]
    pub page_size: u32,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch records, merged with pending local changes
    Fetch(fetch::FetchArgs),

    /// Upload a record, queuing it if the service is unreachable
    Upload(upload::UploadArgs),

    /// Delete a record
    Delete(delete::DeleteArgs),

    /// List queued uploads and deletions
    Pending(pending::PendingArgs),

    /// Push queued uploads and deletions to the service
    Flush(flush::FlushArgs),

    /// Discard all queued offline state
    Reset(reset::ResetArgs),
}
