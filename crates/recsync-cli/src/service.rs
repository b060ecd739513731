//! Service selection for the CLI.

use async_trait::async_trait;
use recsync_core::error::{Error, InvalidInputError};
use recsync_core::{Cursor, Page, Query, Record, RecordId, RecordService, Result, ServiceUrl};
use recsync_file::FileService;
use recsync_http::HttpService;

/// A record service chosen by URL scheme.
///
/// `file://` URLs are served from a local directory; `http(s)://` URLs talk
/// to a remote service.
pub enum CliService {
    File(FileService),
    Http(HttpService),
}

impl CliService {
    /// Connect to the service at `url`.
    pub fn connect(url: &ServiceUrl) -> Result<Self> {
        if url.is_local() {
            Ok(CliService::File(FileService::from_url(url)?))
        } else if url.is_network() {
            Ok(CliService::Http(HttpService::new(url.clone())?))
        } else {
            Err(Error::InvalidInput(InvalidInputError::ServiceUrl {
                value: url.to_string(),
                reason: "expected a file:// or http(s):// URL".to_string(),
            }))
        }
    }
}

#[async_trait]
impl RecordService for CliService {
    async fn query(&self, query: &Query, limit: u32) -> Result<Page> {
        match self {
            CliService::File(s) => s.query(query, limit).await,
            CliService::Http(s) => s.query(query, limit).await,
        }
    }

    async fn fetch_page(&self, cursor: &Cursor, limit: u32) -> Result<Page> {
        match self {
            CliService::File(s) => s.fetch_page(cursor, limit).await,
            CliService::Http(s) => s.fetch_page(cursor, limit).await,
        }
    }

    async fn save(&self, record: &Record) -> Result<Record> {
        match self {
            CliService::File(s) => s.save(record).await,
            CliService::Http(s) => s.save(record).await,
        }
    }

    async fn delete(&self, id: &RecordId) -> Result<RecordId> {
        match self {
            CliService::File(s) => s.delete(id).await,
            CliService::Http(s) => s.delete(id).await,
        }
    }
}
