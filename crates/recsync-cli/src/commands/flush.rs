//! The `flush` command.

use anyhow::Result;
use clap::Args;

use super::open_engine;
use crate::cli::GlobalArgs;
use crate::output;

#[derive(Args, Debug)]
pub struct FlushArgs {}

pub async fn run(global: &GlobalArgs, _args: FlushArgs) -> Result<()> {
    let engine = open_engine(global)?;
    let report = engine.flush_pending().await;

    output::json_pretty(&report)?;

    if !report.failed.is_empty() {
        anyhow::bail!("{} pending operations failed", report.failed.len());
    }
    output::field(
        "Flushed",
        &format!(
            "{} uploads, {} deletions",
            report.uploaded.len(),
            report.deleted.len()
        ),
    );
    Ok(())
}
