//! JSON-file key-value storage
//!
//! Every read goes back to disk so that writes made by another process sharing
//! the same file are picked up on the next read.

use std::{
    collections::BTreeMap,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Mutex,
};

use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::{KeyValueStore, StorageEvent};
use crate::error::StorageError;

type Entries = BTreeMap<String, String>;

/// Key-value store persisted as a flat JSON object on disk
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
    events_tx: broadcast::Sender<StorageEvent>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let (events_tx, _) = broadcast::channel(64);
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
            events_tx,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Entries, StorageError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Entries::new()),
            Err(e) => return Err(e.into()),
        };

        if raw.trim().is_empty() {
            return Ok(Entries::new());
        }

        match serde_json::from_str(&raw) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                warn!("Ignoring unreadable storage file {}: {}", self.path.display(), e);
                Ok(Entries::new())
            }
        }
    }

    fn save(&self, entries: &Entries) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, serde_json::to_vec_pretty(entries)?)?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    fn modify<F>(&self, apply: F) -> Result<(), StorageError>
    where
        F: FnOnce(&mut Entries) -> Vec<String>,
    {
        let changed = {
            let _guard = self.write_lock.lock()
                .map_err(|e| StorageError::Lock(e.to_string()))?;
            let mut entries = self.load()?;
            let changed = apply(&mut entries);
            if !changed.is_empty() {
                self.save(&entries)?;
            }
            changed
        };

        for key in changed {
            debug!("Storage key changed: {}", key);
            let _ = self.events_tx.send(StorageEvent { key });
        }
        Ok(())
    }
}

fn apply_entry(entries: &mut Entries, key: &str, value: Option<&str>) -> bool {
    match value {
        Some(value) => entries.insert(key.to_string(), value.to_string()).as_deref() != Some(value),
        None => entries.remove(key).is_some(),
    }
}

impl KeyValueStore for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.write_many(&[(key, Some(value))])
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.write_many(&[(key, None)])
    }

    fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<String>>, StorageError> {
        let mut entries = self.load()?;
        Ok(keys.iter().map(|key| entries.remove(*key)).collect())
    }

    /// All entries land in one atomic file replace
    fn write_many(&self, batch: &[(&str, Option<&str>)]) -> Result<(), StorageError> {
        self.modify(|entries| {
            batch
                .iter()
                .filter(|(key, value)| apply_entry(entries, key, *value))
                .map(|(key, _)| key.to_string())
                .collect()
        })
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.events_tx.subscribe()
    }
}
