//! Identity and addressing types.
//!
//! These types enforce their invariants at construction time,
//! ensuring invalid states are unrepresentable.

mod cursor;
mod record_id;
mod service_url;

pub use cursor::Cursor;
pub use record_id::{MAX_RECORD_ID_LEN, RecordId};
pub use service_url::ServiceUrl;
