//! Pomodoro Sync - A state-managed pomodoro timer
//! 
//! This library keeps a pomodoro countdown consistent between the dedicated
//! timer view, which owns the countdown, and a global status widget that
//! mirrors and remote-controls it from every other view.

pub mod api;
pub mod bus;
pub mod config;
pub mod error;
pub mod services;
pub mod shell;
pub mod state;
pub mod storage;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use api::create_router;
pub use bus::{Signal, SignalBus};
pub use config::Config;
pub use error::{SessionError, StorageError, TimerError};
pub use state::{AppState, Backends, TimerMode, TimerState, TimerStore};
pub use utils::signals::shutdown_signal;
