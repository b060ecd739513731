//! recsync-core - Core record, query and service types.
//!
//! Everything the sync engine and the service backends agree on lives here:
//! the [`Record`] data model, the [`Query`] descriptor handed to a remote
//! service, the [`RecordService`] and [`Connectivity`] seams, and the
//! unified [`Error`] taxonomy.

pub mod error;
pub mod query;
pub mod record;
pub mod traits;
pub mod types;

pub use error::Error;
pub use query::{Predicate, Query, SortDescriptor, SortKey, sort_records};
pub use record::{Asset, FieldKind, FieldValue, Location, Record, RecordMetadata};
pub use traits::{Connectivity, ManualConnectivity, Page, RecordService};
pub use types::{Cursor, RecordId, ServiceUrl};

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;
