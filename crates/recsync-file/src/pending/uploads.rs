//! Records waiting to be uploaded.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use recsync_core::error::LocalStorageError;
use recsync_core::{Asset, Record, RecordId, Result};

use super::map_file::{MapFile, io_err};
use crate::store::asset_file_name;

/// Subdirectory holding one blob directory per record.
const BLOBS_DIR: &str = "blobs";

/// Identifies one saved version of a pending upload.
///
/// Returned by [`PendingUploads::save`]; [`PendingUploads::remove_revision`]
/// only removes the entry while it is still that version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision(String);

/// One persisted upload: the record with asset paths rewritten to blob
/// paths relative to the queue directory, plus those paths so they can be
/// removed with the entry.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadEntry {
    record: Record,
    blobs: Vec<String>,
    queued_at: DateTime<Utc>,
    #[serde(default)]
    revision: String,
}

/// Blob path of an asset, relative to the queue directory:
/// `blobs/{id}/{key}` or `blobs/{id}/{key}.{index}`.
fn blob_name(id: &RecordId, key: &str, index: Option<usize>) -> String {
    format!("{}/{}/{}", BLOBS_DIR, id, asset_file_name(key, index))
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Durable queue of records whose upload has not reached the remote.
///
/// Keyed by record identity; saving the same identity again replaces the
/// previous entry.
#[derive(Debug)]
pub struct PendingUploads {
    map: MapFile,
}

impl PendingUploads {
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

    /// Persist `record` and copies of its asset blobs, replacing any entry
    /// with the same identity. Returns the revision of the new entry.
    #[instrument(skip(self, record), fields(id = %record.id()))]
    pub fn save(&self, record: &Record) -> Result<Revision> {
        let id = record.id().clone();
        let dir = self.map.dir().to_path_buf();
        let revision = Uuid::new_v4().simple().to_string();

        self.map.update(|map| {
            let mut stored = record.clone();
            let mut blobs = Vec::new();

            stored.map_assets(|key, index, asset| {
                let name = blob_name(&id, key, index);
                let dest = dir.join(&name);
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
                }
                copy_blob(asset.path(), &dest)?;
                blobs.push(name.clone());
                Ok::<_, recsync_core::Error>(Asset::new(name))
            })?;

            let previous = map
                .get(id.as_str())
                .and_then(|v| serde_json::from_value::<UploadEntry>(v.clone()).ok());

            let entry = UploadEntry {
                record: stored,
                blobs,
                queued_at: Utc::now(),
                revision: revision.clone(),
            };
            let value = serde_json::to_value(&entry)
                .map_err(|e| LocalStorageError::serialization(&dir, e))?;
            map.insert(id.to_string(), value);

            if let Some(previous) = previous {
                for stale in previous.blobs.iter().filter(|b| !entry.blobs.contains(b)) {
                    remove_blob(&dir.join(stale))?;
                }
            }

            Ok(())
        })?;

        debug!("Queued pending upload");
        Ok(Revision(revision))
    }

    /// Remove the entry for `id` and its blobs. Returns false if there was
    /// no such entry.
    #[instrument(skip(self), fields(%id))]
    pub fn remove(&self, id: &RecordId) -> Result<bool> {
        self.remove_where(id, |_| true)
    }

    /// Remove the entry for `id` only if it is still `revision`. Returns
    /// false if the entry is gone or was replaced by a newer save.
    #[instrument(skip(self, revision), fields(%id))]
    pub fn remove_revision(&self, id: &RecordId, revision: &Revision) -> Result<bool> {
        self.remove_where(id, |entry| entry.revision == revision.0)
    }

    fn remove_where(&self, id: &RecordId, matches: impl FnOnce(&UploadEntry) -> bool) -> Result<bool> {
        let dir = self.map.dir().to_path_buf();

        let removed = self.map.update(|map| {
            let Some(value) = map.get(id.as_str()) else {
                return Ok(false);
            };

            match serde_json::from_value::<UploadEntry>(value.clone()) {
                Ok(entry) if !matches(&entry) => return Ok(false),
                Ok(entry) => {
                    for blob in &entry.blobs {
                        remove_blob(&dir.join(blob))?;
                    }
                }
                Err(e) => warn!(error = %e, "Removing unreadable pending upload"),
            }

            map.remove(id.as_str());
            remove_blob_dir(&dir.join(BLOBS_DIR).join(id.as_str()))?;
            Ok(true)
        })?;

        if removed {
            debug!("Removed pending upload");
        }
        Ok(removed)
    }

    /// Returns true if an entry exists for `id`.
    pub fn contains(&self, id: &RecordId) -> Result<bool> {
        Ok(self.map.read()?.contains_key(id.as_str()))
    }

    /// The pending version of `id`, if one is queued and readable.
    pub fn get(&self, id: &RecordId) -> Result<Option<Record>> {
        let Some(value) = self.map.read()?.remove(id.as_str()) else {
            return Ok(None);
        };
        match serde_json::from_value::<UploadEntry>(value) {
            Ok(entry) => Ok(rehydrate(self.map.dir(), entry)),
            Err(e) => {
                warn!(%id, error = %e, "Ignoring unreadable pending upload");
                Ok(None)
            }
        }
    }

    /// Reconstruct every pending record, oldest first.
    ///
    /// Entries that cannot be decoded, or whose blobs are missing, are
    /// skipped with a warning.
    pub fn load(&self) -> Result<Vec<Record>> {
        let dir = self.map.dir();
        let mut entries: Vec<UploadEntry> = Vec::new();

        for (key, value) in self.map.read()? {
            match serde_json::from_value::<UploadEntry>(value) {
                Ok(entry) if entry.record.id().as_str() == key => entries.push(entry),
                Ok(_) => warn!(key = %key, "Skipping pending upload filed under the wrong id"),
                Err(e) => warn!(key = %key, error = %e, "Skipping unreadable pending upload"),
            }
        }

        entries.sort_by_key(|e| e.queued_at);

        Ok(entries
            .into_iter()
            .filter_map(|entry| rehydrate(dir, entry))
            .collect())
    }

    /// Drop every pending upload.
    #[instrument(skip(self))]
    pub fn erase_all(&self) -> Result<()> {
        self.map.clear()?;
        debug!("Erased pending uploads");
        Ok(())
    }
}

/// Point asset references back at the blob files in `dir`. Returns `None`
/// if a blob has gone missing.
fn rehydrate(dir: &Path, entry: UploadEntry) -> Option<Record> {
    let mut record = entry.record;
    let rehydrated = record.map_assets(|_, _, asset| {
        let path = dir.join(asset.path());
        if path.is_file() {
            Ok(Asset::new(path))
        } else {
            Err(path)
        }
    });

    match rehydrated {
        Ok(()) => Some(record),
        Err(missing) => {
            warn!(
                id = %record.id(),
                blob = %missing.display(),
                "Skipping pending upload with missing asset"
            );
            None
        }
    }
}

fn copy_blob(src: &Path, dest: &Path) -> Result<()> {
    if same_file(src, dest) {
        return Ok(());
    }
    fs::metadata(src).map_err(|e| io_err(src, e))?;

    let mut temp = dest.as_os_str().to_owned();
    temp.push(".tmp");
    let temp = PathBuf::from(temp);
    fs::copy(src, &temp).map_err(|e| io_err(&temp, e))?;
    fs::rename(&temp, dest).map_err(|e| io_err(dest, e))?;
    Ok(())
}

fn remove_blob(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_err(path, e)),
    }
}

fn remove_blob_dir(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_err(path, e)),
    }
}
