//! recsync - Offline-tolerant record synchronization.
//!
//! A [`SyncEngine`] sits between an application and a paged
//! [`RecordService`]. It fetches pages through a cursor, queues uploads and
//! deletions that cannot reach the service in durable [`PendingQueues`],
//! retries failures after the delay the service asks for, and merges pending
//! local state into every fetched view.
//!
//! # Example
//!
//! ```no_run
//! use recsync::{ManualConnectivity, PendingQueues, Query, SortDescriptor, SortKey, SyncConfig, SyncEngine};
//! use recsync_file::FileService;
//!
//! # async fn example() -> recsync::Result<()> {
//! let connectivity = ManualConnectivity::online();
//! let engine = SyncEngine::new(
//!     FileService::new("/tmp/records"),
//!     connectivity.clone(),
//!     PendingQueues::open("/tmp/pending")?,
//!     SyncConfig::new(10),
//! );
//!
//! engine.set_query(
//!     Query::all("note").sort_by(SortDescriptor::descending(SortKey::ModifiedAt)),
//! );
//! let all = engine.fetch_all().await?;
//! for record in &all.records {
//!     println!("{}", record.id());
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod events;
pub mod fetch;
pub mod reconcile;
pub mod retry;

mod engine;
mod inflight;

// Re-export primary types at crate root for convenience
pub use config::{DEFAULT_INTERVAL, MAX_INTERVAL, RetryPolicy, SyncConfig};
pub use engine::{FetchOutput, SyncEngine};
pub use events::{FlushFailure, FlushReport, RetryOp, SyncEvent};
pub use fetch::{FetchState, PageOutcome, PagedFetcher};
pub use reconcile::reconcile;
pub use retry::RetryScheduler;

pub use recsync_core::{
    Asset, Connectivity, Cursor, Error, FieldValue, Location, ManualConnectivity, Page, Predicate,
    Query, Record, RecordId, RecordMetadata, RecordService, Result, ServiceUrl, SortDescriptor,
    SortKey,
};
pub use recsync_file::PendingQueues;
