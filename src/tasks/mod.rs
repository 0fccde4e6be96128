//! Background tasks module
//! 
//! This module contains the views that run alongside the HTTP server: the
//! timer engine (mounted with the timer route) and the global status widget.

pub mod status_widget;
pub mod timer_engine;
pub mod views;

// Re-export main types and functions
pub use status_widget::{is_widget_visible, run_status_widget, StatusWidget, WidgetView};
pub use timer_engine::{
    dispatch_completion, mount_engine, run_timer_engine, Completion, EngineAction, EngineCommand,
    EngineStatus, MountedEngine, TimerEngine,
};
pub use views::{navigate, sync_mounts};
