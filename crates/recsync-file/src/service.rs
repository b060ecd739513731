//! File-backed record service implementation.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use recsync_core::error::{Error, InvalidInputError};
use recsync_core::traits::{Page, RecordService};
use recsync_core::{Cursor, Query, Record, RecordId, Result, ServiceUrl};

use crate::store::FileStore;

/// Continuation state carried inside a cursor.
#[derive(Debug, Serialize, Deserialize)]
struct CursorState {
    query: Query,
    offset: usize,
}

fn invalid_cursor(reason: impl Into<String>) -> Error {
    Error::InvalidInput(InvalidInputError::Cursor {
        reason: reason.into(),
    })
}

fn encode_cursor(state: &CursorState) -> Result<Cursor> {
    let json = serde_json::to_vec(state).map_err(|e| invalid_cursor(e.to_string()))?;
    let hex: String = json.iter().map(|b| format!("{:02x}", b)).collect();
    Cursor::new(hex)
}

fn decode_cursor(cursor: &Cursor) -> Result<CursorState> {
    let hex = cursor.as_str();
    if hex.len() % 2 != 0 {
        return Err(invalid_cursor("not issued by this service"));
    }
    let bytes = (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16))
        .collect::<std::result::Result<Vec<u8>, _>>()
        .map_err(|_| invalid_cursor("not issued by this service"))?;
    serde_json::from_slice(&bytes).map_err(|_| invalid_cursor("not issued by this service"))
}

/// A record service backed by a local directory.
///
/// Useful for development and tests: it behaves like a remote service with
/// opaque cursors and server-assigned metadata, without a network.
#[derive(Debug, Clone)]
pub struct FileService {
    store: FileStore,
}

impl FileService {
    /// Create a service storing records under `root`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            store: FileStore::new(root),
        }
    }

    /// Create a service from a `file://` URL.
    pub fn from_url(url: &ServiceUrl) -> Result<Self> {
        let path = url.to_file_path().ok_or_else(|| {
            Error::InvalidInput(InvalidInputError::ServiceUrl {
                value: url.to_string(),
                reason: "not a file:// URL".to_string(),
            })
        })?;
        Ok(Self::new(path))
    }

    /// Access the underlying store.
    pub fn store(&self) -> &FileStore {
        &self.store
    }

    fn page(&self, query: Query, offset: usize, limit: u32) -> Result<Page> {
        let limit = limit.max(1) as usize;
        let (records, next) = self.store.query_window(&query, offset, limit)?;
        let cursor = match next {
            Some(offset) => Some(encode_cursor(&CursorState { query, offset })?),
            None => None,
        };
        Ok(Page { records, cursor })
    }
}

#[async_trait]
impl RecordService for FileService {
    #[instrument(skip(self, query), fields(record_type = %query.record_type))]
    async fn query(&self, query: &Query, limit: u32) -> Result<Page> {
        debug!(limit, "Starting query");
        self.page(query.clone(), 0, limit)
    }

    #[instrument(skip(self, cursor))]
    async fn fetch_page(&self, cursor: &Cursor, limit: u32) -> Result<Page> {
        let state = decode_cursor(cursor)?;
        debug!(offset = state.offset, limit, "Continuing query");
        self.page(state.query, state.offset, limit)
    }

    #[instrument(skip(self, record), fields(id = %record.id()))]
    async fn save(&self, record: &Record) -> Result<Record> {
        self.store.save_record(record)
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: &RecordId) -> Result<RecordId> {
        self.store.delete_record(id)?;
        Ok(id.clone())
    }
}
