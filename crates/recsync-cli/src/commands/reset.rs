//! The `reset` command.

use anyhow::{Context, Result};
use clap::Args;

use super::open_queues;
use crate::cli::GlobalArgs;
use crate::output;

#[derive(Args, Debug)]
pub struct ResetArgs {
    /// Confirm discarding every queued upload and deletion
    #[arg(long)]
    pub yes: bool,
}

pub async fn run(global: &GlobalArgs, args: ResetArgs) -> Result<()> {
    if !args.yes {
        anyhow::bail!("Refusing to discard queued changes without --yes");
    }
    let queues = open_queues(global)?;
    queues
        .erase_all()
        .context("Failed to discard offline state")?;
    output::success("Discarded offline state");
    Ok(())
}
