//! recsync-file - Filesystem-backed storage for recsync.
//!
//! Provides the durable local pending store used by the sync engine, and a
//! directory-backed [`FileService`] that stands in for a remote record
//! service during development and testing.

pub mod pending;
mod service;
mod store;

pub use pending::{PendingDeletions, PendingQueues, PendingUploads, Revision};
pub use service::FileService;
pub use store::FileStore;
