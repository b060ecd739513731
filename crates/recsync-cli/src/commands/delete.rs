//! The `delete` command.

use anyhow::{Context, Result};
use clap::Args;
use recsync::RecordId;

use super::open_engine;
use crate::cli::GlobalArgs;
use crate::output;

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Id of the record to delete
    pub id: String,
}

pub async fn run(global: &GlobalArgs, args: DeleteArgs) -> Result<()> {
    let id = RecordId::new(args.id).context("Invalid record id")?;
    let engine = open_engine(global)?;

    engine
        .delete(&id)
        .await
        .with_context(|| format!("Failed to delete {}", id))?;

    if engine.queues().deletions.contains(&id)? {
        output::warning(&format!("Offline; deletion of {} queued", id));
    } else {
        output::success(&format!("Deleted {}", id));
    }
    Ok(())
}
