//! External side-effect services
//! 
//! This module contains the collaborators the timer reaches out to: the
//! completed-session backend, completion-sound playback and user notifications.

pub mod notifications;
pub mod sessions;
pub mod sound;

// Re-export main types
pub use notifications::{Notification, NotificationLevel, Notifications};
pub use sessions::{FileSessionRecorder, MemorySessionRecorder, SessionRecord, SessionRecorder};
pub use sound::{CommandSoundPlayer, SilentPlayer, SoundPlayer};
