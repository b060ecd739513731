//! The `upload` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use recsync::{Asset, Record, RecordId};

use super::{open_engine, parse_value, split_pair};
use crate::cli::GlobalArgs;
use crate::output;

#[derive(Args, Debug)]
pub struct UploadArgs {
    /// Record type
    #[arg(long = "type")]
    pub record_type: String,

    /// Record id (generated when omitted; reuse an id to replace a record)
    #[arg(long)]
    pub id: Option<String>,

    /// Field value (key=value, repeatable)
    #[arg(long = "field")]
    pub fields: Vec<String>,

    /// Attach a file as an asset field (key=path, repeatable)
    #[arg(long = "asset")]
    pub assets: Vec<String>,
}

fn build_record(args: &UploadArgs) -> Result<Record> {
    let id = match &args.id {
        Some(raw) => RecordId::new(raw.as_str()).context("Invalid record id")?,
        None => RecordId::generate(),
    };
    let mut record = Record::with_id(id, &args.record_type).context("Invalid record type")?;

    for raw in &args.fields {
        let (key, value) = split_pair(raw)?;
        record
            .set(key, parse_value(value))
            .with_context(|| format!("Invalid field '{}'", key))?;
    }

    for raw in &args.assets {
        let (key, path) = split_pair(raw)?;
        let path = PathBuf::from(path);
        if !path.is_file() {
            anyhow::bail!("Asset file not found: {}", path.display());
        }
        record
            .set(key, Asset::new(path))
            .with_context(|| format!("Invalid asset field '{}'", key))?;
    }

    Ok(record)
}

pub async fn run(global: &GlobalArgs, args: UploadArgs) -> Result<()> {
    let record = build_record(&args)?;
    let engine = open_engine(global)?;

    let stored = match engine.upload(record).await {
        Ok(stored) => stored,
        Err(e) if !global.no_offline_support && !e.is_local_storage() => {
            if let Some(after) = e.retry_after() {
                output::warning(&format!(
                    "Service asked to retry after {}s; run `recsync flush` later",
                    after.as_secs()
                ));
            }
            return Err(e).context("Upload failed; the record stays queued");
        }
        Err(e) => return Err(e).context("Upload failed"),
    };

    output::json_pretty(&stored)?;
    if stored.metadata().is_none() {
        output::warning("Offline; queued for upload");
    }
    Ok(())
}
