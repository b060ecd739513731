//! The `pending` command.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde::Serialize;

use super::open_queues;
use crate::cli::GlobalArgs;
use crate::output;

#[derive(Args, Debug)]
pub struct PendingArgs {
    /// Print the queues as a single JSON document
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct PendingSummary {
    uploads: Vec<recsync::Record>,
    deletions: Vec<recsync::RecordId>,
}

pub async fn run(global: &GlobalArgs, args: PendingArgs) -> Result<()> {
    let queues = open_queues(global)?;
    let summary = PendingSummary {
        uploads: queues.uploads.load()?,
        deletions: queues.deletions.load()?,
    };

    if args.json {
        return output::json_pretty(&summary);
    }

    if summary.uploads.is_empty() && summary.deletions.is_empty() {
        println!("{}", "Nothing pending".dimmed());
        return Ok(());
    }

    for record in &summary.uploads {
        println!("{} {} ({})", "upload".cyan(), record.id(), record.record_type());
    }
    for id in &summary.deletions {
        println!("{} {}", "delete".red(), id);
    }
    Ok(())
}
