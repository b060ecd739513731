//! The `fetch` command.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use recsync::{Predicate, Query, SortDescriptor, SortKey};

use super::{open_engine, parse_value, split_pair};
use crate::cli::GlobalArgs;
use crate::output;

#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Record type to fetch
    #[arg(long = "type")]
    pub record_type: String,

    /// Only records whose field equals a value (key=value)
    #[arg(long = "where")]
    pub filter: Option<String>,

    /// Sort by a field, or @created / @modified; append :desc for descending
    #[arg(long)]
    pub sort: Vec<String>,

    /// Keep fetching until the result set is exhausted
    #[arg(long)]
    pub all: bool,
}

fn parse_sort(raw: &str) -> SortDescriptor {
    let (name, ascending) = match raw.rsplit_once(':') {
        Some((name, "desc")) => (name, false),
        Some((name, "asc")) => (name, true),
        _ => (raw, true),
    };
    let key = match name {
        "@created" => SortKey::CreatedAt,
        "@modified" => SortKey::ModifiedAt,
        field => SortKey::Field(field.to_string()),
    };
    SortDescriptor { key, ascending }
}

fn build_query(args: &FetchArgs) -> Result<Query> {
    let mut query = Query::all(&args.record_type);
    if let Some(raw) = &args.filter {
        let (field, value) = split_pair(raw)?;
        query = query.filter(Predicate::Equals {
            field: field.to_string(),
            value: parse_value(value),
        });
    }
    for raw in &args.sort {
        query = query.sort_by(parse_sort(raw));
    }
    Ok(query)
}

pub async fn run(global: &GlobalArgs, args: FetchArgs) -> Result<()> {
    let engine = open_engine(global)?;
    engine.set_query(build_query(&args)?);

    let result = if args.all {
        engine.fetch_all().await
    } else {
        engine.fetch().await
    };
    let fetched = result.context("Failed to fetch records")?;

    for record in &fetched.records {
        output::json(record)?;
    }

    eprintln!(
        "{}",
        format!(
            "{} records ({} from the service this call)",
            fetched.records.len(),
            fetched.fetched
        )
        .dimmed()
    );
    output::field("State", &format!("{:?}", fetched.state).to_lowercase());
    if let Some(cursor) = engine.cursor() {
        output::field("Cursor", cursor.as_str());
    }

    Ok(())
}
