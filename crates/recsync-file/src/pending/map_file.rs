//! The single-file identity map shared by both pending queues.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use fs2::FileExt;
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use recsync_core::Result;
use recsync_core::error::LocalStorageError;

const MAP_FILE: &str = "entries.json";
const LOCK_FILE: &str = "entries.lock";

/// Raw identity -> entry map. Entries stay as JSON so that one bad entry
/// cannot poison the rest of the map.
pub(crate) type RawMap = BTreeMap<String, Value>;

pub(crate) fn io_err(path: &Path, err: std::io::Error) -> recsync_core::Error {
    LocalStorageError::io(path, err).into()
}

/// A directory holding one serialized map plus sibling files.
///
/// Mutations are serialized by an in-process mutex and an exclusive file
/// lock, and the map is replaced by rename, so readers only ever see a
/// complete map.
#[derive(Debug)]
pub(crate) struct MapFile {
    dir: PathBuf,
    writer: Mutex<()>,
}

impl MapFile {
    pub(crate) fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
        Ok(Self {
            dir,
            writer: Mutex::new(()),
        })
    }

    pub(crate) fn dir(&self) -> &Path {
        &self.dir
    }

    fn map_path(&self) -> PathBuf {
        self.dir.join(MAP_FILE)
    }

    fn lock_path(&self) -> PathBuf {
        self.dir.join(LOCK_FILE)
    }

    /// Read the current map. A missing map is empty; an undecodable map is
    /// logged and treated as empty.
    pub(crate) fn read(&self) -> Result<RawMap> {
        let path = self.map_path();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(RawMap::new()),
            Err(e) => return Err(io_err(&path, e)),
        };

        match serde_json::from_str(&content) {
            Ok(map) => Ok(map),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Discarding unreadable pending map");
                Ok(RawMap::new())
            }
        }
    }

    /// Read-modify-write the map under the writer lock.
    ///
    /// `f` may also touch sibling files in the directory; it runs while the
    /// lock is held.
    pub(crate) fn update<T>(&self, f: impl FnOnce(&mut RawMap) -> Result<T>) -> Result<T> {
        self.locked(|| {
            let mut map = self.read()?;
            let out = f(&mut map)?;
            self.write(&map)?;
            Ok(out)
        })
    }

    /// Remove the map and every sibling file.
    pub(crate) fn clear(&self) -> Result<()> {
        self.locked(|| {
            let entries = fs::read_dir(&self.dir).map_err(|e| io_err(&self.dir, e))?;
            for entry in entries {
                let entry = entry.map_err(|e| io_err(&self.dir, e))?;
                if entry.file_name() == LOCK_FILE {
                    continue;
                }
                let path = entry.path();
                let removed = if path.is_dir() {
                    fs::remove_dir_all(&path)
                } else {
                    fs::remove_file(&path)
                };
                removed.map_err(|e| io_err(&path, e))?;
            }
            Ok(())
        })
    }

    fn locked<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);

        let lock_path = self.lock_path();
        let lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| io_err(&lock_path, e))?;

        lock_file
            .lock_exclusive()
            .map_err(|e| io_err(&lock_path, e))?;

        let out = f();

        FileExt::unlock(&lock_file).map_err(|e| io_err(&lock_path, e))?;

        out
    }

    fn write(&self, map: &RawMap) -> Result<()> {
        let path = self.map_path();
        let content = serde_json::to_vec_pretty(map)
            .map_err(|e| LocalStorageError::serialization(&path, e))?;

        let temp_path = self.dir.join(format!("{}.{}.tmp", MAP_FILE, Uuid::new_v4().simple()));
        let written = (|| {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(&content)?;
            file.sync_data()?;
            fs::rename(&temp_path, &path)
        })();

        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path);
            return Err(io_err(&path, e));
        }

        Ok(())
    }
}
