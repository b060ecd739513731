//! Filesystem storage for the file-backed record service.

use std::collections::hash_map::DefaultHasher;
use std::fs::{self, OpenOptions};
use std::hash::{Hash, Hasher};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Utc;
use fs2::FileExt;
use tracing::{debug, instrument};

use recsync_core::error::{Error, RemoteError, TransportError};
use recsync_core::{Asset, Query, Record, RecordId, RecordMetadata, Result, sort_records};

fn map_io(err: std::io::Error) -> Error {
    Error::Transport(TransportError::Http {
        message: format!("IO error: {}", err),
    })
}

fn map_json(err: serde_json::Error) -> Error {
    Error::Transport(TransportError::Http {
        message: format!("corrupt record: {}", err),
    })
}

fn not_found(id: &RecordId) -> Error {
    Error::Remote(RemoteError::new(
        404,
        Some("RecordNotFound".to_string()),
        Some(format!("Record {} not found", id)),
    ))
}

/// File name of an asset inside its record's asset directory. Field keys
/// never contain `.`, so list items cannot collide with other keys.
pub(crate) fn asset_file_name(key: &str, index: Option<usize>) -> String {
    match index {
        Some(i) => format!("{}.{}", key, i),
        None => key.to_string(),
    }
}

/// Filesystem-backed record storage.
///
/// Layout under the root: `records/{id}.json`, `assets/{id}/{key}` (or
/// `{key}.{index}` for asset lists) and a `service.lock` serializing writers.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Create a new file store at the given root directory.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Get the root directory path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn records_dir(&self) -> PathBuf {
        self.root.join("records")
    }

    fn assets_dir(&self) -> PathBuf {
        self.root.join("assets")
    }

    fn lock_path(&self) -> PathBuf {
        self.root.join("service.lock")
    }

    fn record_path(&self, id: &RecordId) -> PathBuf {
        self.records_dir().join(format!("{}.json", id))
    }

    /// Content hash used as the change tag.
    fn change_tag(&self, content: &str) -> String {
        let mut hasher = DefaultHasher::new();
        content.hash(&mut hasher);
        format!("ct{:016x}", hasher.finish())
    }

    /// Run `f` holding the store's exclusive write lock.
    fn locked<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        fs::create_dir_all(&self.root).map_err(map_io)?;

        let lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(self.lock_path())
            .map_err(map_io)?;

        lock_file.lock_exclusive().map_err(map_io)?;
        let out = f();
        FileExt::unlock(&lock_file).map_err(map_io)?;
        out
    }

    /// Read a stored record.
    pub fn get_record(&self, id: &RecordId) -> Result<Option<Record>> {
        let path = self.record_path(id);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(map_io(e)),
        };
        serde_json::from_str(&content).map(Some).map_err(map_json)
    }

    /// Store a record, copying its assets and assigning metadata.
    #[instrument(skip(self, record), fields(id = %record.id()))]
    pub fn save_record(&self, record: &Record) -> Result<Record> {
        self.locked(|| {
            let records_dir = self.records_dir();
            let assets_dir = self.assets_dir();
            fs::create_dir_all(&records_dir).map_err(map_io)?;
            fs::create_dir_all(&assets_dir).map_err(map_io)?;

            let id = record.id().clone();
            let created_at = self
                .get_record(&id)?
                .and_then(|existing| existing.metadata().map(|m| m.created_at));

            let mut stored = record.clone();
            let record_assets = assets_dir.join(id.as_str());
            stored.map_assets(|key, index, asset| {
                let dest = record_assets.join(asset_file_name(key, index));
                if asset.path() != dest {
                    fs::create_dir_all(&record_assets).map_err(map_io)?;
                    fs::copy(asset.path(), &dest).map_err(map_io)?;
                }
                Ok::<_, Error>(Asset::new(dest))
            })?;

            let fields = stored.fields().collect::<Vec<_>>();
            let fields_json = serde_json::to_string(&fields).map_err(map_json)?;
            let now = Utc::now();
            stored.set_metadata(Some(RecordMetadata {
                created_at: created_at.unwrap_or(now),
                modified_at: now,
                change_tag: self.change_tag(&fields_json),
            }));

            let content = serde_json::to_string_pretty(&stored).map_err(map_json)?;
            let path = self.record_path(&id);
            let temp_path = path.with_extension("tmp");
            fs::write(&temp_path, &content).map_err(map_io)?;
            fs::rename(&temp_path, &path).map_err(map_io)?;

            debug!(record_type = stored.record_type(), "Stored record");
            Ok(stored)
        })
    }

    /// Delete a record and its assets.
    #[instrument(skip(self))]
    pub fn delete_record(&self, id: &RecordId) -> Result<()> {
        self.locked(|| {
            let record = self.get_record(id)?.ok_or_else(|| not_found(id))?;

            for (_, _, asset) in record.assets() {
                match fs::remove_file(asset.path()) {
                    Ok(()) => {}
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(map_io(e)),
                }
            }

            match fs::remove_dir_all(self.assets_dir().join(id.as_str())) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(map_io(e)),
            }

            fs::remove_file(self.record_path(id)).map_err(map_io)?;
            debug!("Deleted record");
            Ok(())
        })
    }

    /// Evaluate `query` and return the window starting at `offset`, plus the
    /// offset of the next window if more records remain.
    #[instrument(skip(self, query), fields(record_type = %query.record_type))]
    pub fn query_window(
        &self,
        query: &Query,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<Record>, Option<usize>)> {
        let dir = self.records_dir();
        let mut records = Vec::new();

        if dir.exists() {
            for entry in fs::read_dir(&dir).map_err(map_io)? {
                let path = entry.map_err(map_io)?.path();
                if path.extension().is_none_or(|ext| ext != "json") {
                    continue;
                }
                let content = fs::read_to_string(&path).map_err(map_io)?;
                if let Ok(record) = serde_json::from_str::<Record>(&content)
                    && query.matches(&record)
                {
                    records.push(record);
                }
            }
        }

        records.sort_by(|a, b| a.id().cmp(b.id()));
        sort_records(&mut records, &query.sort);

        let total = records.len();
        let window: Vec<Record> = records.into_iter().skip(offset).take(limit).collect();
        let end = offset + window.len();
        let next = (end < total).then_some(end);

        debug!(total, returned = window.len(), "Evaluated query");
        Ok((window, next))
    }
}
