//! Timer state structure and its persisted form
//!
//! The typed [`TimerState`] makes the end-time / remaining-snapshot exclusivity
//! structural: a running timer only carries its end timestamp, a paused timer
//! only carries its remaining seconds. [`PersistedTimer`] is the loosely typed
//! five-key representation written to storage.

use serde::{Deserialize, Serialize};

use super::TimerMode;
use crate::{
    error::StorageError,
    storage::{
        KeyValueStore, KEY_TIMER_ACTIVE, KEY_TIMER_END_AT, KEY_TIMER_MODE, KEY_TIMER_PAUSED,
        KEY_TIMER_REMAINING, TIMER_KEYS,
    },
    utils::seconds_until,
};

/// Countdown phase; each variant holds only its authoritative field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum TimerPhase {
    Idle,
    #[serde(rename_all = "camelCase")]
    Running { ends_at_ms: i64 },
    #[serde(rename_all = "camelCase")]
    Paused { remaining_secs: u32 },
}

/// State of the current pomodoro session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    pub mode: TimerMode,
    pub phase: TimerPhase,
}

impl TimerState {
    pub fn idle(mode: TimerMode) -> Self {
        Self { mode, phase: TimerPhase::Idle }
    }

    pub fn running(mode: TimerMode, ends_at_ms: i64) -> Self {
        Self { mode, phase: TimerPhase::Running { ends_at_ms } }
    }

    /// Running state that reaches zero `remaining_secs` after `now_ms`
    pub fn running_for(mode: TimerMode, remaining_secs: u32, now_ms: i64) -> Self {
        Self::running(mode, now_ms + i64::from(remaining_secs) * 1000)
    }

    pub fn paused(mode: TimerMode, remaining_secs: u32) -> Self {
        Self { mode, phase: TimerPhase::Paused { remaining_secs } }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self.phase, TimerPhase::Idle)
    }

    pub fn is_paused(&self) -> bool {
        matches!(self.phase, TimerPhase::Paused { .. })
    }

    pub fn is_running(&self) -> bool {
        matches!(self.phase, TimerPhase::Running { .. })
    }

    /// Remaining seconds derived from whichever field is authoritative
    pub fn remaining_secs(&self, now_ms: i64) -> Option<u32> {
        match self.phase {
            TimerPhase::Idle => None,
            TimerPhase::Running { ends_at_ms } => Some(seconds_until(ends_at_ms, now_ms)),
            TimerPhase::Paused { remaining_secs } => Some(remaining_secs),
        }
    }

    /// Running becomes paused at the current remaining time; other phases are unchanged
    pub fn paused_at(&self, now_ms: i64) -> Self {
        match self.phase {
            TimerPhase::Running { ends_at_ms } => {
                Self::paused(self.mode, seconds_until(ends_at_ms, now_ms))
            }
            _ => *self,
        }
    }

    /// Paused becomes running from the snapshot; other phases are unchanged
    pub fn resumed_at(&self, now_ms: i64) -> Self {
        match self.phase {
            TimerPhase::Paused { remaining_secs } => {
                Self::running_for(self.mode, remaining_secs, now_ms)
            }
            _ => *self,
        }
    }
}

impl Default for TimerState {
    fn default() -> Self {
        Self::idle(TimerMode::default())
    }
}

/// Raw values of the five persisted timer keys
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistedTimer {
    pub active: Option<String>,
    pub paused: Option<String>,
    pub mode: Option<String>,
    pub end_at: Option<String>,
    pub remaining: Option<String>,
}

impl PersistedTimer {
    /// Read the raw key values from storage in one pass
    pub fn read(storage: &dyn KeyValueStore) -> Result<Self, StorageError> {
        let values = storage.get_many(&TIMER_KEYS)?;
        Ok(Self::from_values(values))
    }

    /// Write present values and remove absent ones in one batch
    pub fn write(&self, storage: &dyn KeyValueStore) -> Result<(), StorageError> {
        storage.write_many(&self.entries())
    }

    /// Key/value pairs in [`TIMER_KEYS`] order; `None` means the key is removed
    pub fn entries(&self) -> [(&'static str, Option<&str>); 5] {
        [
            (KEY_TIMER_ACTIVE, self.active.as_deref()),
            (KEY_TIMER_PAUSED, self.paused.as_deref()),
            (KEY_TIMER_MODE, self.mode.as_deref()),
            (KEY_TIMER_END_AT, self.end_at.as_deref()),
            (KEY_TIMER_REMAINING, self.remaining.as_deref()),
        ]
    }

    /// Rebuild from values read in [`TIMER_KEYS`] order
    pub fn from_values(values: impl IntoIterator<Item = Option<String>>) -> Self {
        let mut values = values.into_iter();
        Self {
            active: values.next().flatten(),
            paused: values.next().flatten(),
            mode: values.next().flatten(),
            end_at: values.next().flatten(),
            remaining: values.next().flatten(),
        }
    }

    /// Persisted form of `state`; a running timer may carry a handoff snapshot
    pub fn encode(state: &TimerState, handoff_remaining: Option<u32>) -> Self {
        match state.phase {
            TimerPhase::Idle => Self::default(),
            TimerPhase::Running { ends_at_ms } => Self {
                active: Some("true".to_string()),
                paused: Some("false".to_string()),
                mode: Some(state.mode.as_str().to_string()),
                end_at: Some(ends_at_ms.to_string()),
                remaining: handoff_remaining.map(|secs| secs.to_string()),
            },
            TimerPhase::Paused { remaining_secs } => Self {
                active: Some("true".to_string()),
                paused: Some("true".to_string()),
                mode: Some(state.mode.as_str().to_string()),
                end_at: None,
                remaining: Some(remaining_secs.to_string()),
            },
        }
    }

    /// Typed state; anything malformed decodes as idle
    pub fn decode(&self) -> TimerState {
        let mode: TimerMode = self
            .mode
            .as_deref()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_default();

        if parse_flag(&self.active) != Some(true) {
            return TimerState::idle(mode);
        }

        match parse_flag(&self.paused) {
            Some(true) => match self.handoff_remaining() {
                Some(remaining_secs) => TimerState::paused(mode, remaining_secs),
                None => TimerState::idle(mode),
            },
            Some(false) | None => match self.end_at.as_deref().and_then(|raw| raw.trim().parse::<i64>().ok()) {
                Some(ends_at_ms) => TimerState::running(mode, ends_at_ms),
                None => TimerState::idle(mode),
            },
        }
    }

    /// Remaining-seconds snapshot stored alongside a running timer
    pub fn handoff_remaining(&self) -> Option<u32> {
        self.remaining.as_deref().and_then(|raw| raw.trim().parse::<u32>().ok())
    }
}

fn parse_flag(value: &Option<String>) -> Option<bool> {
    match value.as_deref().map(str::trim) {
        Some("true") => Some(true),
        Some("false") => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[test]
    fn test_running_remaining_rounds() {
        let state = TimerState::running_for(TimerMode::Focus, 1500, 0);
        assert_eq!(state.remaining_secs(0), Some(1500));
        assert_eq!(state.remaining_secs(10_000), Some(1490));
        assert_eq!(state.remaining_secs(10_600), Some(1489));
        assert_eq!(state.remaining_secs(2_000_000), Some(0));
    }

    #[test]
    fn test_paused_ignores_wall_clock() {
        let paused = TimerState::running_for(TimerMode::Focus, 1500, 0).paused_at(10_000);
        assert_eq!(paused, TimerState::paused(TimerMode::Focus, 1490));
        assert_eq!(paused.remaining_secs(310_000), Some(1490));

        let resumed = paused.resumed_at(310_000);
        assert_eq!(resumed.remaining_secs(310_000), Some(1490));
    }

    #[test]
    fn test_pause_and_resume_noop_on_wrong_phase() {
        let idle = TimerState::idle(TimerMode::LongBreak);
        assert_eq!(idle.paused_at(5), idle);
        assert_eq!(idle.resumed_at(5), idle);

        let running = TimerState::running(TimerMode::Focus, 9_000);
        assert_eq!(running.resumed_at(5), running);
    }

    #[test]
    fn test_encode_keeps_one_authoritative_field() {
        let running = PersistedTimer::encode(&TimerState::running(TimerMode::Focus, 42_000), None);
        assert_eq!(running.end_at.as_deref(), Some("42000"));
        assert_eq!(running.remaining, None);

        let paused = PersistedTimer::encode(&TimerState::paused(TimerMode::ShortBreak, 90), None);
        assert_eq!(paused.end_at, None);
        assert_eq!(paused.remaining.as_deref(), Some("90"));
        assert_eq!(paused.mode.as_deref(), Some("shortBreak"));

        assert_eq!(PersistedTimer::encode(&TimerState::idle(TimerMode::Focus), None), PersistedTimer::default());
    }

    #[test]
    fn test_decode_paused_ignores_stale_end_at() {
        let raw = PersistedTimer {
            active: Some("true".into()),
            paused: Some("true".into()),
            mode: Some("focus".into()),
            end_at: Some("1".into()),
            remaining: Some("1490".into()),
        };
        assert_eq!(raw.decode(), TimerState::paused(TimerMode::Focus, 1490));
    }

    #[test]
    fn test_decode_malformed_is_idle() {
        let inactive = PersistedTimer {
            active: Some("false".into()),
            end_at: Some("99".into()),
            ..Default::default()
        };
        assert!(!inactive.decode().is_active());

        let garbage_flag = PersistedTimer {
            active: Some("yes".into()),
            ..Default::default()
        };
        assert!(!garbage_flag.decode().is_active());

        let missing_end = PersistedTimer {
            active: Some("true".into()),
            paused: Some("false".into()),
            ..Default::default()
        };
        assert!(!missing_end.decode().is_active());

        let bad_remaining = PersistedTimer {
            active: Some("true".into()),
            paused: Some("true".into()),
            remaining: Some("-3".into()),
            ..Default::default()
        };
        assert!(!bad_remaining.decode().is_active());
    }

    #[test]
    fn test_write_then_read_through_storage() {
        let storage = MemoryStorage::new();
        let state = TimerState::running(TimerMode::LongBreak, 123_456);
        PersistedTimer::encode(&state, Some(30)).write(&storage).unwrap();

        let read = PersistedTimer::read(&storage).unwrap();
        assert_eq!(read.decode(), state);
        assert_eq!(read.handoff_remaining(), Some(30));

        PersistedTimer::encode(&TimerState::idle(TimerMode::Focus), None).write(&storage).unwrap();
        assert_eq!(PersistedTimer::read(&storage).unwrap(), PersistedTimer::default());
    }
}
