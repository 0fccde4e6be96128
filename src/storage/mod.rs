//! Persisted key-value storage
//!
//! The timer state is persisted as a handful of string entries under fixed
//! key names. Other code sharing the same storage must respect the rules in
//! [`crate::state::timer_state`] when reading or writing these keys.

pub mod file;
pub mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use tokio::sync::broadcast;

use crate::error::StorageError;

/// Whether a countdown is running or paused (vs. idle)
pub const KEY_TIMER_ACTIVE: &str = "timerActive";
/// Whether the active countdown is paused
pub const KEY_TIMER_PAUSED: &str = "timerPaused";
/// Which mode preset is in effect
pub const KEY_TIMER_MODE: &str = "timerMode";
/// Epoch milliseconds at which a running countdown reaches zero
pub const KEY_TIMER_END_AT: &str = "timerEndAt";
/// Remaining-seconds snapshot, written on pause and on handoff
pub const KEY_TIMER_REMAINING: &str = "timerRemaining";
/// Short-lived "preserve timer state on next mount" flag
pub const KEY_PRESERVE_ON_MOUNT: &str = "timerPreserveOnMount";

/// The five keys holding the timer state
pub const TIMER_KEYS: [&str; 5] = [
    KEY_TIMER_ACTIVE,
    KEY_TIMER_PAUSED,
    KEY_TIMER_MODE,
    KEY_TIMER_END_AT,
    KEY_TIMER_REMAINING,
];

/// Returns true for every key the timer protocol owns
pub fn is_timer_key(key: &str) -> bool {
    key == KEY_PRESERVE_ON_MOUNT || TIMER_KEYS.contains(&key)
}

/// Storage-change notification fired after a successful mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    pub key: String,
}

/// A string key-value store that survives reloads
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Read several keys; backends that can read them from one snapshot should
    fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<String>>, StorageError> {
        keys.iter().map(|key| self.get(key)).collect()
    }

    /// Apply sets (`Some`) and removals (`None`) together; backends that can
    /// should make them visible in a single write
    fn write_many(&self, entries: &[(&str, Option<&str>)]) -> Result<(), StorageError> {
        for (key, value) in entries {
            match value {
                Some(value) => self.set(key, value)?,
                None => self.remove(key)?,
            }
        }
        Ok(())
    }

    /// Subscribe to storage-change notifications
    fn subscribe(&self) -> broadcast::Receiver<StorageEvent>;
}
