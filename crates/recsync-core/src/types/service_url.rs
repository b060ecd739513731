//! Where a record service lives.

use std::fmt;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use url::{Host, Url};

use crate::error::{Error, InvalidInputError};

/// Address of a record service.
///
/// A `file://` URL names a directory-backed service. Anything else must be
/// an HTTPS base URL, or plain HTTP to a loopback host; endpoint paths are
/// resolved below it, so it carries no query or fragment.
///
/// ```
/// use recsync_core::ServiceUrl;
///
/// let remote = ServiceUrl::new("https://records.example.com/api").unwrap();
/// assert_eq!(
///     remote.endpoint("v1/records/abc").unwrap().as_str(),
///     "https://records.example.com/api/v1/records/abc"
/// );
///
/// let local = ServiceUrl::new("file:///tmp/records").unwrap();
/// assert!(local.is_local());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServiceUrl {
    /// A service stored in a local directory.
    Directory { url: Url, path: PathBuf },
    /// A service reached over HTTP. The base path always ends in `/`.
    Remote(Url),
}

fn reject(value: &str, reason: impl Into<String>) -> Error {
    InvalidInputError::ServiceUrl {
        value: value.to_string(),
        reason: reason.into(),
    }
    .into()
}

fn is_loopback(host: Option<Host<&str>>) -> bool {
    match host {
        Some(Host::Domain(name)) => name.eq_ignore_ascii_case("localhost"),
        Some(Host::Ipv4(ip)) => IpAddr::V4(ip).is_loopback(),
        Some(Host::Ipv6(ip)) => IpAddr::V6(ip).is_loopback(),
        None => false,
    }
}

impl ServiceUrl {
    /// Parse and classify `s`.
    pub fn new(s: impl AsRef<str>) -> Result<Self, Error> {
        let raw = s.as_ref();
        let mut url = Url::parse(raw).map_err(|e| reject(raw, e.to_string()))?;

        match url.scheme() {
            "file" => {
                let path = url
                    .to_file_path()
                    .map_err(|()| reject(raw, "not a local directory path"))?;
                if path.parent().is_none() {
                    return Err(reject(raw, "refusing to use the filesystem root"));
                }
                Ok(ServiceUrl::Directory { url, path })
            }
            "https" | "http" => {
                if url.host().is_none() {
                    return Err(reject(raw, "missing host"));
                }
                if url.scheme() == "http" && !is_loopback(url.host()) {
                    return Err(reject(raw, "plain HTTP is only allowed to loopback hosts"));
                }
                if url.query().is_some() || url.fragment().is_some() {
                    return Err(reject(raw, "base URL cannot carry a query or fragment"));
                }
                if !url.path().ends_with('/') {
                    let path = format!("{}/", url.path());
                    url.set_path(&path);
                }
                Ok(ServiceUrl::Remote(url))
            }
            other => Err(reject(raw, format!("unsupported scheme '{}'", other))),
        }
    }

    fn url(&self) -> &Url {
        match self {
            ServiceUrl::Directory { url, .. } | ServiceUrl::Remote(url) => url,
        }
    }

    pub fn as_str(&self) -> &str {
        self.url().as_str()
    }

    /// True for a directory-backed service.
    pub fn is_local(&self) -> bool {
        matches!(self, ServiceUrl::Directory { .. })
    }

    /// True for a service reached over HTTP.
    pub fn is_network(&self) -> bool {
        matches!(self, ServiceUrl::Remote(_))
    }

    /// The directory of a directory-backed service.
    pub fn to_file_path(&self) -> Option<PathBuf> {
        self.directory().map(Path::to_path_buf)
    }

    pub fn directory(&self) -> Option<&Path> {
        match self {
            ServiceUrl::Directory { path, .. } => Some(path),
            ServiceUrl::Remote(_) => None,
        }
    }

    /// Resolve an endpoint path below the base URL.
    pub fn endpoint(&self, path: &str) -> Result<Url, Error> {
        self.url()
            .join(path.trim_start_matches('/'))
            .map_err(|e| reject(path, e.to_string()))
    }
}

impl fmt::Display for ServiceUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceUrl {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}
