//! Identities waiting to be deleted remotely.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use recsync_core::error::LocalStorageError;
use recsync_core::{RecordId, Result};

use super::map_file::MapFile;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeletionEntry {
    queued_at: DateTime<Utc>,
}

/// Durable queue of record identities whose remote deletion is pending.
#[derive(Debug)]
pub struct PendingDeletions {
    map: MapFile,
}

impl PendingDeletions {
    /// Open (creating if needed) the queue in `dir`.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            map: MapFile::open(dir)?,
        })
    }

    /// The queue directory.
    pub fn dir(&self) -> &Path {
        self.map.dir()
    }

    /// Record the intent to delete `id`. Saving twice keeps one entry and
    /// its original queue time.
    #[instrument(skip(self), fields(%id))]
    pub fn save(&self, id: &RecordId) -> Result<()> {
        let dir = self.map.dir().to_path_buf();
        self.map.update(|map| {
            if !map.contains_key(id.as_str()) {
                let entry = DeletionEntry {
                    queued_at: Utc::now(),
                };
                let value = serde_json::to_value(&entry)
                    .map_err(|e| LocalStorageError::serialization(&dir, e))?;
                map.insert(id.to_string(), value);
            }
            Ok(())
        })?;

        debug!("Queued pending deletion");
        Ok(())
    }

    /// Forget the deletion of `id`. Returns false if it was not queued.
    #[instrument(skip(self), fields(%id))]
    pub fn remove(&self, id: &RecordId) -> Result<bool> {
        self.map.update(|map| Ok(map.remove(id.as_str()).is_some()))
    }

    /// Returns true if a deletion is queued for `id`.
    pub fn contains(&self, id: &RecordId) -> Result<bool> {
        Ok(self.map.read()?.contains_key(id.as_str()))
    }

    /// Every queued identity, oldest first.
    pub fn load(&self) -> Result<Vec<RecordId>> {
        let mut entries: Vec<(DateTime<Utc>, RecordId)> = Vec::new();

        for (key, value) in self.map.read()? {
            let id = match RecordId::new(&key) {
                Ok(id) => id,
                Err(e) => {
                    warn!(key = %key, error = %e, "Skipping pending deletion with invalid id");
                    continue;
                }
            };
            match serde_json::from_value::<DeletionEntry>(value) {
                Ok(entry) => entries.push((entry.queued_at, id)),
                Err(e) => warn!(key = %key, error = %e, "Skipping unreadable pending deletion"),
            }
        }

        entries.sort();
        Ok(entries.into_iter().map(|(_, id)| id).collect())
    }

    /// Drop every pending deletion.
    #[instrument(skip(self))]
    pub fn erase_all(&self) -> Result<()> {
        self.map.clear()?;
        debug!("Erased pending deletions");
        Ok(())
    }
}
