//! Versioned timer store
//!
//! `TimerStore` is the single owner of the timer state. Every mutation goes
//! through one locked commit that rewrites all related persisted keys together,
//! bumps the version and publishes the new snapshot to watchers.
//!
//! The store remembers the raw key values it last persisted. Storage that no
//! longer matches them was written by someone else and is adopted on the next
//! [`TimerStore::sync_from_storage`]; storage that still matches is ours and is
//! never read back over newer in-memory state.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::{PersistedTimer, TimerMode, TimerState};
use crate::{
    bus::{Signal, SignalBus},
    error::{StorageError, TimerError, TimerResult},
    storage::{is_timer_key, KeyValueStore, KEY_PRESERVE_ON_MOUNT, TIMER_KEYS},
    utils::Clock,
};

/// How long a "preserve on next mount" flag stays valid
pub const HANDOFF_TTL_MS: i64 = 10_000;

/// Snapshot handed from the widget to the timer view across a navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handoff {
    pub remaining_secs: u32,
    pub paused: bool,
    pub issued_at_ms: i64,
}

impl Handoff {
    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms.saturating_sub(self.issued_at_ms) > HANDOFF_TTL_MS
    }
}

/// A committed store snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionedTimerState {
    pub version: u64,
    pub state: TimerState,
    pub handoff: Option<Handoff>,
}

/// Raw values of every key the store owns, including the preserve flag
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct StoredTimer {
    timer: PersistedTimer,
    preserve: Option<String>,
}

impl StoredTimer {
    fn encode(snapshot: &VersionedTimerState) -> Result<Self, StorageError> {
        let handoff_remaining = snapshot
            .handoff
            .filter(|_| snapshot.state.is_running())
            .map(|handoff| handoff.remaining_secs);
        let preserve = snapshot.handoff.map(|handoff| serde_json::to_string(&handoff)).transpose()?;

        Ok(Self {
            timer: PersistedTimer::encode(&snapshot.state, handoff_remaining),
            preserve,
        })
    }

    fn read(storage: &dyn KeyValueStore) -> Result<Self, StorageError> {
        let mut keys = TIMER_KEYS.to_vec();
        keys.push(KEY_PRESERVE_ON_MOUNT);
        let mut values = storage.get_many(&keys)?;
        let preserve = values.pop().flatten();

        Ok(Self {
            timer: PersistedTimer::from_values(values),
            preserve,
        })
    }

    fn write(&self, storage: &dyn KeyValueStore) -> Result<(), StorageError> {
        let mut entries = self.timer.entries().to_vec();
        entries.push((KEY_PRESERVE_ON_MOUNT, self.preserve.as_deref()));
        storage.write_many(&entries)
    }

    fn decode(&self) -> (TimerState, Option<Handoff>) {
        let state = self.timer.decode();
        let handoff = self
            .preserve
            .as_deref()
            .and_then(|raw| serde_json::from_str::<Handoff>(raw).ok())
            .filter(|_| state.is_active());
        (state, handoff)
    }
}

struct StoreInner {
    snapshot: VersionedTimerState,
    /// What this store last wrote to (or read from) storage
    persisted: StoredTimer,
    /// The latest commit has not reached storage yet
    unsaved: bool,
}

impl StoreInner {
    /// Install a new state, returning the bumped snapshot if anything changed
    fn advance(&mut self, state: TimerState, handoff: Option<Handoff>) -> Option<VersionedTimerState> {
        if state == self.snapshot.state && handoff == self.snapshot.handoff {
            return None;
        }
        self.snapshot = VersionedTimerState {
            version: self.snapshot.version + 1,
            state,
            handoff,
        };
        Some(self.snapshot)
    }
}

/// Typed single-owner container for the timer state
pub struct TimerStore {
    storage: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    inner: Mutex<StoreInner>,
    state_tx: watch::Sender<VersionedTimerState>,
}

impl TimerStore {
    /// Create a store seeded from whatever is already persisted
    pub fn new(storage: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        let persisted = match StoredTimer::read(storage.as_ref()) {
            Ok(read) => read,
            Err(e) => {
                warn!("Failed to read persisted timer state, starting idle: {}", e);
                StoredTimer::default()
            }
        };

        let (state, handoff) = persisted.decode();
        if state.is_active() {
            info!("Restored persisted timer: mode={}, paused={}", state.mode, state.is_paused());
        }

        let initial = VersionedTimerState { version: 0, state, handoff };
        let (state_tx, _) = watch::channel(initial);

        Self {
            storage,
            clock,
            inner: Mutex::new(StoreInner {
                snapshot: initial,
                persisted,
                unsaved: false,
            }),
            state_tx,
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    fn lock(&self) -> TimerResult<MutexGuard<'_, StoreInner>> {
        self.inner.lock().map_err(|_| TimerError::Lock("timer store"))
    }

    /// Latest committed snapshot
    pub fn snapshot(&self) -> TimerResult<VersionedTimerState> {
        Ok(self.lock()?.snapshot)
    }

    /// Watch committed snapshots
    pub fn subscribe(&self) -> watch::Receiver<VersionedTimerState> {
        self.state_tx.subscribe()
    }

    /// Whether the latest commit is still waiting to reach storage
    pub fn has_unsaved_changes(&self) -> TimerResult<bool> {
        Ok(self.lock()?.unsaved)
    }

    /// Atomically replace the state (and handoff) computed from the current snapshot.
    /// The version only moves when something actually changed.
    pub fn update<F>(&self, action: &str, updater: F) -> TimerResult<VersionedTimerState>
    where
        F: FnOnce(&VersionedTimerState) -> (TimerState, Option<Handoff>),
    {
        let mut inner = self.lock()?;
        let (state, handoff) = updater(&inner.snapshot);
        let Some(next) = inner.advance(state, handoff) else {
            return Ok(inner.snapshot);
        };

        // In-memory state stays authoritative even if the write fails
        self.persist(&mut inner, action);
        drop(inner);

        debug!("Timer store v{} after {}: {:?}", next.version, action, next.state.phase);
        self.state_tx.send_replace(next);
        Ok(next)
    }

    fn persist(&self, inner: &mut StoreInner, action: &str) {
        let written = StoredTimer::encode(&inner.snapshot)
            .and_then(|stored| stored.write(self.storage.as_ref()).map(|_| stored));
        match written {
            Ok(stored) => {
                inner.persisted = stored;
                inner.unsaved = false;
            }
            Err(e) => {
                warn!("Failed to persist timer state after {}: {}", action, e);
                inner.unsaved = true;
            }
        }
    }

    /// Replace the state wholesale, dropping any pending handoff
    pub fn set(&self, action: &str, state: TimerState) -> TimerResult<VersionedTimerState> {
        self.update(action, |_| (state, None))
    }

    /// Start a countdown of `remaining_secs` in `mode`
    pub fn start(&self, mode: TimerMode, remaining_secs: u32) -> TimerResult<VersionedTimerState> {
        let now = self.now_ms();
        self.set("start", TimerState::running_for(mode, remaining_secs, now))
    }

    /// Convert a running timer into a paused snapshot
    pub fn pause(&self) -> TimerResult<VersionedTimerState> {
        let now = self.now_ms();
        self.update("pause", |current| (current.state.paused_at(now), None))
    }

    /// Convert a paused snapshot back into a running timer
    pub fn resume(&self) -> TimerResult<VersionedTimerState> {
        let now = self.now_ms();
        self.update("resume", |current| (current.state.resumed_at(now), None))
    }

    /// Flip between running and paused; an idle timer cannot be toggled
    pub fn toggle(&self) -> TimerResult<VersionedTimerState> {
        let now = self.now_ms();
        let mut was_idle = false;
        let snapshot = self.update("toggle", |current| {
            let next = if current.state.is_paused() {
                current.state.resumed_at(now)
            } else if current.state.is_running() {
                current.state.paused_at(now)
            } else {
                was_idle = true;
                current.state
            };
            (next, current.handoff)
        })?;

        if was_idle {
            return Err(TimerError::Inactive);
        }
        Ok(snapshot)
    }

    /// Go idle and remove every persisted timer key
    pub fn clear(&self) -> TimerResult<VersionedTimerState> {
        self.update("clear", |current| (TimerState::idle(current.state.mode), None))
    }

    /// Snapshot the remaining time and raise the preserve-on-next-mount flag
    pub fn mark_handoff(&self) -> TimerResult<Option<Handoff>> {
        let now = self.now_ms();
        let snapshot = self.update("handoff", |current| {
            let handoff = current.state.remaining_secs(now).map(|remaining_secs| Handoff {
                remaining_secs,
                paused: current.state.is_paused(),
                issued_at_ms: now,
            });
            (current.state, handoff)
        })?;
        Ok(snapshot.handoff)
    }

    /// Consume the preserve flag; expired flags are discarded
    pub fn take_handoff(&self) -> TimerResult<Option<Handoff>> {
        let now = self.now_ms();
        let mut taken = None;
        self.update("take handoff", |current| {
            taken = current.handoff.filter(|handoff| !handoff.is_expired(now));
            (current.state, None)
        })?;
        Ok(taken)
    }

    /// Adopt changes another process wrote to the shared storage.
    ///
    /// Storage is read under the commit lock, so no local commit can land
    /// between the read and the adoption. A commit that never reached storage
    /// is written again instead of being overwritten by what storage holds.
    pub fn sync_from_storage(&self) -> TimerResult<VersionedTimerState> {
        let mut inner = self.lock()?;

        if inner.unsaved {
            self.persist(&mut inner, "storage retry");
            if !inner.unsaved {
                info!("Persisted timer state after earlier write failure");
            }
            return Ok(inner.snapshot);
        }

        let stored = match StoredTimer::read(self.storage.as_ref()) {
            Ok(stored) => stored,
            Err(e) => {
                warn!("Failed to re-read persisted timer state: {}", e);
                return Ok(inner.snapshot);
            }
        };
        if stored == inner.persisted {
            return Ok(inner.snapshot);
        }

        let (state, handoff) = stored.decode();
        // Persisted idle state carries no mode; keep ours
        let state = if !state.is_active() && !inner.snapshot.state.is_active() {
            inner.snapshot.state
        } else {
            state
        };
        inner.persisted = stored;

        let Some(next) = inner.advance(state, handoff) else {
            return Ok(inner.snapshot);
        };
        drop(inner);

        info!("Adopted timer state written elsewhere (v{}): {:?}", next.version, next.state.phase);
        self.state_tx.send_replace(next);
        Ok(next)
    }

    /// Forward storage-change notifications for timer keys onto the bus
    pub async fn forward_storage_events(self: Arc<Self>, bus: SignalBus) {
        let mut events_rx = self.storage.subscribe();
        loop {
            match events_rx.recv().await {
                Ok(event) if is_timer_key(&event.key) => {
                    bus.publish(Signal::StorageChanged { key: event.key });
                }
                Ok(_) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("Storage forwarder lagged by {} events", skipped);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}
