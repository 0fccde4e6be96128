//! State management module
//! 
//! This module contains the timer data model, the versioned timer store and
//! the application state shared by every view.

pub mod app_state;
pub mod mode;
pub mod store;
pub mod timer_state;

// Re-export main types
pub use app_state::{AppState, Backends};
pub use mode::{ModeDurations, TimerMode};
pub use store::{Handoff, TimerStore, VersionedTimerState, HANDOFF_TTL_MS};
pub use timer_state::{PersistedTimer, TimerPhase, TimerState};
