//! JSON-file backed key-value store.
//!
//! The whole map is rewritten on every change. Client state is a handful
//! of small keys, so this keeps the file consistent without a journal.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::storage::{KeyValueStore, StoreResult};

/// Key-value store persisted as a JSON object on disk.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open the store at `path`, loading existing contents if the file exists.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            let map: BTreeMap<String, String> = serde_json::from_reader(reader)?;
            tracing::debug!(path = %path.display(), keys = map.len(), "Loaded client state");
            map
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("tmp");
        {
            let writer = BufWriter::new(File::create(&tmp)?);
            serde_json::to_writer_pretty(writer, entries)?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut entries = self.entries.lock();
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries)
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        let mut entries = self.entries.lock();
        if entries.remove(key).is_some() {
            self.flush(&entries)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persistence() {
        let path = std::env::temp_dir().join(format!("gateway-state-{}.json", uuid::Uuid::new_v4()));

        let store = FileStore::open(&path).unwrap();
        store.set("api.base_url", "http://10.0.0.5:8080").unwrap();
        store.set("auth.token", "t0k3n").unwrap();
        store.remove("auth.token").unwrap();

        // Load new instance
        let loaded = FileStore::open(&path).unwrap();
        assert_eq!(loaded.get("api.base_url").as_deref(), Some("http://10.0.0.5:8080"));
        assert!(loaded.get("auth.token").is_none());

        std::fs::remove_file(&path).unwrap_or_default();
    }

    #[test]
    fn test_corrupt_file() {
        let path = std::env::temp_dir().join(format!("gateway-state-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, "{not json").unwrap();

        assert!(FileStore::open(&path).is_err());

        std::fs::remove_file(&path).unwrap_or_default();
    }
}
