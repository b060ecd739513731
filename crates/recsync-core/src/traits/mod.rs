//! Core traits for record services and connectivity.

mod connectivity;
mod service;

pub use connectivity::{Connectivity, ManualConnectivity};
pub use service::{Page, RecordService};
