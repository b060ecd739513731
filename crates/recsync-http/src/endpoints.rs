//! Endpoint paths and request/response bodies.

use serde::{Deserialize, Serialize};

use recsync_core::{Query, Record};

/// Start a query.
pub const QUERY: &str = "v1/records:query";

/// Continue a query from a cursor.
pub const PAGE: &str = "v1/records:page";

/// Path of a single record, for `PUT` and `DELETE`.
pub fn record_path(id: &str) -> String {
    format!("v1/records/{}", id)
}

/// Request body for [`QUERY`].
#[derive(Debug, Serialize)]
pub struct QueryRequest<'a> {
    pub query: &'a Query,
    pub limit: u32,
}

/// Request body for [`PAGE`].
#[derive(Debug, Serialize)]
pub struct PageRequest<'a> {
    pub cursor: &'a str,
    pub limit: u32,
}

/// Response from [`QUERY`] and [`PAGE`].
#[derive(Debug, Deserialize)]
pub struct PageResponse {
    pub records: Vec<Record>,
    #[serde(default)]
    pub cursor: Option<String>,
}

/// Response from a record delete.
#[derive(Debug, Deserialize)]
pub struct DeleteResponse {
    pub id: String,
}

/// Error body returned with non-2xx responses.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    /// Suggested retry delay in seconds.
    #[serde(default)]
    pub retry_after: Option<u64>,
}
