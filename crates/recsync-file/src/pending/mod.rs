//! The local pending store.
//!
//! Two durable queues hold work the remote service has not acknowledged:
//! records to upload and identities to delete. Each queue is a directory
//! with one serialized identity map; the upload queue also keeps asset
//! blobs in one directory per record, `blobs/{recordId}/{fieldKey}`.

mod deletions;
mod map_file;
mod uploads;

use std::path::{Path, PathBuf};

use tracing::info;

use recsync_core::Result;

pub use deletions::PendingDeletions;
pub use uploads::{PendingUploads, Revision};

const UPLOADS_DIR: &str = "uploads";
const DELETIONS_DIR: &str = "deletions";

/// Both pending queues rooted at one directory.
#[derive(Debug)]
pub struct PendingQueues {
    root: PathBuf,
    pub uploads: PendingUploads,
    pub deletions: PendingDeletions,
}

impl PendingQueues {
    /// Open (creating if needed) `root/uploads` and `root/deletions`.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let uploads = PendingUploads::open(root.join(UPLOADS_DIR))?;
        let deletions = PendingDeletions::open(root.join(DELETIONS_DIR))?;
        Ok(Self {
            root,
            uploads,
            deletions,
        })
    }

    /// The root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Discard all offline state in both queues.
    pub fn erase_all(&self) -> Result<()> {
        self.uploads.erase_all()?;
        self.deletions.erase_all()?;
        info!(root = %self.root.display(), "Discarded all pending work");
        Ok(())
    }
}
