//! Error types for recsync.
//!
//! One error type is shared by the engine and every service backend so that
//! callers can tell a rejection by the remote service apart from data that is
//! stuck in the local pending store.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

/// The unified error type for recsync operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The remote service answered with a failure.
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    /// The remote service could not be reached.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Reading or writing the local pending store failed.
    ///
    /// The affected record is not synced and not safely queued.
    #[error("local storage error: {0}")]
    LocalStorage(#[from] LocalStorageError),

    /// No connectivity is available and offline support is disabled.
    #[error("no connectivity and offline support is disabled")]
    Offline,

    /// A fetch was requested with neither a query nor a cursor.
    #[error("no query configured")]
    NoQuery,

    /// Input validation errors (record ids, field keys, URLs).
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InvalidInputError),
}

impl Error {
    /// The retry delay the remote service asked for, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Error::Remote(err) => err.retry_after,
            _ => None,
        }
    }

    /// Returns true if the failure happened on the remote side of the call.
    pub fn is_remote(&self) -> bool {
        matches!(self, Error::Remote(_) | Error::Transport(_))
    }

    /// Returns true if the failure happened in the local pending store.
    pub fn is_local_storage(&self) -> bool {
        matches!(self, Error::LocalStorage(_))
    }

    /// Returns true if the remote service reported the record as missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Remote(err) if err.is_not_found())
    }
}

/// A failure reported by the remote record service.
#[derive(Debug, Clone)]
pub struct RemoteError {
    /// HTTP-style status code.
    pub status: u16,
    /// Machine-readable error code, if present.
    pub code: Option<String>,
    /// Error message from the service.
    pub message: Option<String>,
    /// How long the service asked the client to wait before retrying.
    pub retry_after: Option<Duration>,
}

impl RemoteError {
    /// Create a new remote error without a retry hint.
    pub fn new(status: u16, code: Option<String>, message: Option<String>) -> Self {
        Self {
            status,
            code,
            message,
            retry_after: None,
        }
    }

    /// Attach a retry-after hint.
    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }

    /// Check if this error means the record does not exist.
    pub fn is_not_found(&self) -> bool {
        self.status == 404 || self.code.as_deref() == Some("RecordNotFound")
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "status {}", self.status)?;
        if let Some(ref code) = self.code {
            write!(f, " [{}]", code)?;
        }
        if let Some(ref message) = self.message {
            write!(f, ": {}", message)?;
        }
        if let Some(retry_after) = self.retry_after {
            write!(f, " (retry after {}s)", retry_after.as_secs())?;
        }
        Ok(())
    }
}

impl std::error::Error for RemoteError {}

/// Transport-level errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network connection failed.
    #[error("connection failed: {message}")]
    Connection { message: String },

    /// Request timed out.
    #[error("request timed out")]
    Timeout,

    /// Generic HTTP error.
    #[error("HTTP error: {message}")]
    Http { message: String },
}

/// Failures of the local pending store.
#[derive(Debug, Error)]
pub enum LocalStorageError {
    /// Filesystem error.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An entry could not be encoded or decoded.
    #[error("serialization error at {}: {message}", path.display())]
    Serialization { path: PathBuf, message: String },
}

impl LocalStorageError {
    /// Build an I/O error for the given path.
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        LocalStorageError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Build a serialization error for the given path.
    pub fn serialization(path: impl AsRef<Path>, message: impl fmt::Display) -> Self {
        LocalStorageError::Serialization {
            path: path.as_ref().to_path_buf(),
            message: message.to_string(),
        }
    }
}

/// Input validation errors.
#[derive(Debug, Error)]
pub enum InvalidInputError {
    /// Invalid record identity.
    #[error("invalid record id '{value}': {reason}")]
    RecordId { value: String, reason: String },

    /// Invalid field key.
    #[error("invalid field key '{value}': {reason}")]
    FieldKey { value: String, reason: String },

    /// Invalid field value.
    #[error("invalid value for field '{key}': {reason}")]
    FieldValue { key: String, reason: String },

    /// Invalid cursor.
    #[error("invalid cursor: {reason}")]
    Cursor { reason: String },

    /// Invalid service URL.
    #[error("invalid service URL '{value}': {reason}")]
    ServiceUrl { value: String, reason: String },

    /// Generic invalid input.
    #[error("invalid input: {message}")]
    Other { message: String },
}
