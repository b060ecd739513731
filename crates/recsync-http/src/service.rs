//! HTTP-backed record service implementation.

use async_trait::async_trait;
use reqwest::Method;
use tracing::{debug, instrument};

use recsync_core::traits::{Page, RecordService};
use recsync_core::{Cursor, Query, Record, RecordId, Result, ServiceUrl};

use crate::client::HttpClient;
use crate::endpoints::*;

/// A network-backed record service.
///
/// Asset fields are sent as the path they reference; the service is
/// expected to share a filesystem with the client or to resolve them itself.
#[derive(Debug, Clone)]
pub struct HttpService {
    client: HttpClient,
}

impl HttpService {
    /// Create a service talking to `url`.
    pub fn new(url: ServiceUrl) -> Result<Self> {
        Ok(Self {
            client: HttpClient::new(url)?,
        })
    }

    /// Returns the service URL.
    pub fn url(&self) -> &ServiceUrl {
        self.client.base()
    }

    fn into_page(response: PageResponse) -> Result<Page> {
        let cursor = match response.cursor {
            Some(c) if !c.is_empty() => Some(Cursor::new(c)?),
            _ => None,
        };
        Ok(Page {
            records: response.records,
            cursor,
        })
    }
}

#[async_trait]
impl RecordService for HttpService {
    #[instrument(skip(self, query), fields(record_type = %query.record_type))]
    async fn query(&self, query: &Query, limit: u32) -> Result<Page> {
        debug!(limit, "Starting query via HTTP");
        let request = QueryRequest { query, limit };
        let response: PageResponse = self
            .client
            .send(Method::POST, QUERY, Some(&request))
            .await?;
        Self::into_page(response)
    }

    #[instrument(skip(self, cursor))]
    async fn fetch_page(&self, cursor: &Cursor, limit: u32) -> Result<Page> {
        debug!(limit, "Continuing query via HTTP");
        let request = PageRequest {
            cursor: cursor.as_str(),
            limit,
        };
        let response: PageResponse = self
            .client
            .send(Method::POST, PAGE, Some(&request))
            .await?;
        Self::into_page(response)
    }

    #[instrument(skip(self, record), fields(id = %record.id()))]
    async fn save(&self, record: &Record) -> Result<Record> {
        self.client
            .send(Method::PUT, &record_path(record.id().as_str()), Some(record))
            .await
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: &RecordId) -> Result<RecordId> {
        let response: DeleteResponse = self
            .client
            .send::<(), _>(Method::DELETE, &record_path(id.as_str()), None)
            .await?;
        RecordId::new(response.id)
    }
}
