//! In-memory key-value storage

use std::{collections::HashMap, sync::Mutex};

use tokio::sync::broadcast;

use super::{KeyValueStore, StorageEvent};
use crate::error::StorageError;

/// Key-value store kept entirely in memory
#[derive(Debug)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
    events_tx: broadcast::Sender<StorageEvent>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        let (events_tx, _) = broadcast::channel(64);
        Self {
            entries: Mutex::new(HashMap::new()),
            events_tx,
        }
    }

    fn notify(&self, key: &str) {
        // No subscribers is fine
        let _ = self.events_tx.send(StorageEvent { key: key.to_string() });
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock()
            .map_err(|e| StorageError::Lock(e.to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let changed = {
            let mut entries = self.entries.lock()
                .map_err(|e| StorageError::Lock(e.to_string()))?;
            entries.insert(key.to_string(), value.to_string()).as_deref() != Some(value)
        };
        if changed {
            self.notify(key);
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let removed = {
            let mut entries = self.entries.lock()
                .map_err(|e| StorageError::Lock(e.to_string()))?;
            entries.remove(key).is_some()
        };
        if removed {
            self.notify(key);
        }
        Ok(())
    }

    fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<String>>, StorageError> {
        let entries = self.entries.lock()
            .map_err(|e| StorageError::Lock(e.to_string()))?;
        Ok(keys.iter().map(|key| entries.get(*key).cloned()).collect())
    }

    fn write_many(&self, batch: &[(&str, Option<&str>)]) -> Result<(), StorageError> {
        let changed: Vec<&str> = {
            let mut entries = self.entries.lock()
                .map_err(|e| StorageError::Lock(e.to_string()))?;
            batch
                .iter()
                .filter(|(key, value)| match value {
                    Some(value) => entries.insert(key.to_string(), value.to_string()).as_deref() != Some(*value),
                    None => entries.remove(*key).is_some(),
                })
                .map(|(key, _)| *key)
                .collect()
        };
        for key in changed {
            self.notify(key);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.events_tx.subscribe()
    }
}
