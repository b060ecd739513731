//! Subcommand implementations and the setup they share.

pub mod delete;
pub mod fetch;
pub mod flush;
pub mod pending;
pub mod reset;
pub mod upload;

use std::path::PathBuf;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use recsync::{ManualConnectivity, PendingQueues, ServiceUrl, SyncConfig, SyncEngine};

use crate::cli::GlobalArgs;
use crate::service::CliService;

/// Resolve the directory holding the pending queues.
fn data_dir(global: &GlobalArgs) -> Result<PathBuf> {
    if let Some(dir) = &global.data_dir {
        return Ok(dir.clone());
    }
    let dirs = ProjectDirs::from("", "", "recsync")
        .context("Could not determine a data directory; pass --data-dir")?;
    Ok(dirs.data_dir().join("pending"))
}

/// Open the pending queues without contacting any service.
pub fn open_queues(global: &GlobalArgs) -> Result<PendingQueues> {
    let dir = data_dir(global)?;
    PendingQueues::open(&dir)
        .with_context(|| format!("Failed to open pending queues at {}", dir.display()))
}

/// Build an engine over the configured service.
///
/// The process exits as soon as the command finishes, so background flushes
/// after a fetch are disabled; `recsync flush` pushes queued work instead.
pub fn open_engine(global: &GlobalArgs) -> Result<SyncEngine<CliService>> {
    let raw = global
        .service
        .as_deref()
        .context("No service configured; pass --service or set RECSYNC_SERVICE")?;
    let url = ServiceUrl::new(raw).context("Invalid service URL")?;
    let service = CliService::connect(&url).context("Failed to connect to service")?;

    let connectivity = if global.offline {
        ManualConnectivity::offline()
    } else {
        ManualConnectivity::online()
    };

    let config = SyncConfig::new(global.page_size)
        .with_offline_support(!global.no_offline_support)
        .with_flush_on_fetch(false);

    tracing::debug!(service = %url, offline = global.offline, "Opening engine");
    Ok(SyncEngine::new(
        service,
        connectivity,
        open_queues(global)?,
        config,
    ))
}

/// Split a `key=value` argument.
pub fn split_pair(raw: &str) -> Result<(&str, &str)> {
    raw.split_once('=')
        .with_context(|| format!("Expected key=value, got '{}'", raw))
}

/// Interpret a command-line value as the narrowest matching field type.
///
/// Integers become ints, other numbers doubles, and everything else a string.
/// Prefix a value with `str:` to keep it a string.
pub fn parse_value(raw: &str) -> recsync::FieldValue {
    if let Some(s) = raw.strip_prefix("str:") {
        return s.into();
    }
    if let Ok(i) = raw.parse::<i64>() {
        return i.into();
    }
    match raw.parse::<f64>() {
        Ok(f) if f.is_finite() => f.into(),
        _ => raw.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recsync::FieldValue;

    #[test]
    fn values_are_typed() {
        assert_eq!(parse_value("42"), FieldValue::Int(42));
        assert_eq!(parse_value("2.5"), FieldValue::Double(2.5));
        assert_eq!(parse_value("hello"), FieldValue::String("hello".into()));
        assert_eq!(parse_value("str:42"), FieldValue::String("42".into()));
        assert_eq!(parse_value("NaN"), FieldValue::String("NaN".into()));
    }

    #[test]
    fn pairs_split_on_first_equals() {
        assert_eq!(split_pair("a=b=c").unwrap(), ("a", "b=c"));
        assert!(split_pair("novalue").is_err());
    }
}
