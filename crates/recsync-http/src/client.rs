//! JSON-over-HTTP client.

use std::time::Duration;

use reqwest::header::RETRY_AFTER;
use reqwest::{Method, Response};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, instrument, trace};

use recsync_core::error::{Error, RemoteError, TransportError};
use recsync_core::{Result, ServiceUrl};

use crate::endpoints::ErrorResponse;

/// Default per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub(crate) fn transport_error(err: reqwest::Error) -> Error {
    let transport = if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::Connection {
            message: err.to_string(),
        }
    } else {
        TransportError::Http {
            message: err.to_string(),
        }
    };
    Error::Transport(transport)
}

/// HTTP client bound to one service base URL.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    base: ServiceUrl,
}

impl HttpClient {
    /// Create a client for the service at `base`.
    pub fn new(base: ServiceUrl) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("recsync/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(transport_error)?;

        Ok(Self { client, base })
    }

    /// Returns the service URL this client talks to.
    pub fn base(&self) -> &ServiceUrl {
        &self.base
    }

    /// Send `body` as JSON with `method` and decode a JSON response.
    #[instrument(skip(self, body), fields(service = %self.base))]
    pub async fn send<B, R>(&self, method: Method, path: &str, body: Option<&B>) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.base.endpoint(path)?;
        debug!(%method, %url, "HTTP request");

        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(transport_error)?;
        self.handle_response(response).await
    }

    async fn handle_response<R: DeserializeOwned>(&self, response: Response) -> Result<R> {
        let status = response.status();
        trace!(status = %status, "HTTP response");

        if status.is_success() {
            response.json::<R>().await.map_err(transport_error)
        } else {
            Err(Error::Remote(parse_error_response(response).await))
        }
    }
}

/// Build a [`RemoteError`] from a failed response.
///
/// The `Retry-After` header wins over a `retryAfter` field in the body.
async fn parse_error_response(response: Response) -> RemoteError {
    let status = response.status().as_u16();
    let header_retry = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());

    let body = response.json::<ErrorResponse>().await.ok();
    let (code, message, body_retry) = match body {
        Some(b) => (b.error, b.message, b.retry_after),
        None => (None, None, None),
    };

    let error = RemoteError::new(status, code, message);
    match header_retry.or(body_retry) {
        Some(secs) => error.with_retry_after(Duration::from_secs(secs)),
        None => error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_creation() {
        let base = ServiceUrl::new("https://records.example.com").unwrap();
        let client = HttpClient::new(base.clone()).unwrap();
        assert_eq!(client.base().as_str(), base.as_str());
    }
}
