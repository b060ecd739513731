//! Remote record service trait.

use std::sync::Arc;

use async_trait::async_trait;

use crate::Result;
use crate::query::Query;
use crate::record::Record;
use crate::types::{Cursor, RecordId};

/// One page of query results.
#[derive(Debug, Clone, Default)]
pub struct Page {
    /// The records in this page.
    pub records: Vec<Record>,

    /// Cursor for the next page, if more records exist.
    pub cursor: Option<Cursor>,
}

/// A remote record service.
///
/// Failures carrying a retry hint are reported as
/// [`Error::Remote`](crate::Error::Remote) with `retry_after` set.
#[async_trait]
pub trait RecordService: Send + Sync {
    /// Start a query, returning at most `limit` records.
    async fn query(&self, query: &Query, limit: u32) -> Result<Page>;

    /// Continue the query that issued `cursor`.
    async fn fetch_page(&self, cursor: &Cursor, limit: u32) -> Result<Page>;

    /// Store a record, returning it with server metadata populated.
    async fn save(&self, record: &Record) -> Result<Record>;

    /// Delete a record by identity.
    async fn delete(&self, id: &RecordId) -> Result<RecordId>;
}

#[async_trait]
impl<T: RecordService + ?Sized> RecordService for Arc<T> {
    async fn query(&self, query: &Query, limit: u32) -> Result<Page> {
        (**self).query(query, limit).await
    }

    async fn fetch_page(&self, cursor: &Cursor, limit: u32) -> Result<Page> {
        (**self).fetch_page(cursor, limit).await
    }

    async fn save(&self, record: &Record) -> Result<Record> {
        (**self).save(record).await
    }

    async fn delete(&self, id: &RecordId) -> Result<RecordId> {
        (**self).delete(id).await
    }
}
