//! Main application state management

use std::{
    sync::{atomic::AtomicU64, Arc, Mutex},
    time::Instant,
};
use chrono::{DateTime, Utc};
use tokio::sync::{oneshot, watch};
use tracing::{info, warn};

use super::{ModeDurations, TimerStore};
use crate::{
    bus::SignalBus,
    error::{TimerError, TimerResult},
    services::{MemorySessionRecorder, Notifications, SessionRecorder, SilentPlayer, SoundPlayer},
    shell::{AuthState, RouterState},
    storage::{KeyValueStore, MemoryStorage},
    tasks::{EngineAction, EngineCommand, EngineStatus, MountedEngine, WidgetView},
    utils::{Clock, SystemClock},
};

/// Pluggable collaborators behind the application state
#[derive(Clone)]
pub struct Backends {
    pub storage: Arc<dyn KeyValueStore>,
    pub clock: Arc<dyn Clock>,
    pub sessions: Arc<dyn SessionRecorder>,
    pub sound: Arc<dyn SoundPlayer>,
}

impl Backends {
    /// Everything in memory, silent playback
    pub fn in_memory(clock: Arc<dyn Clock>) -> Self {
        Self {
            storage: Arc::new(MemoryStorage::new()),
            clock,
            sessions: Arc::new(MemorySessionRecorder::new()),
            sound: Arc::new(SilentPlayer),
        }
    }
}

impl Default for Backends {
    fn default() -> Self {
        Self::in_memory(Arc::new(SystemClock))
    }
}

/// Main application state shared by every view and handler
pub struct AppState {
    /// Authoritative timer state
    pub store: Arc<TimerStore>,
    pub bus: SignalBus,
    pub auth: AuthState,
    pub router: RouterState,
    pub durations: ModeDurations,
    pub sessions: Arc<dyn SessionRecorder>,
    pub sound: Arc<dyn SoundPlayer>,
    pub notifications: Notifications,
    /// Timer engine, present while the timer view is mounted
    pub mounted_engine: Mutex<Option<MountedEngine>>,
    /// Latest status widget rendering
    pub widget_view_tx: watch::Sender<WidgetView>,
    /// Sign-outs whose timer cleanup has already run
    pub handled_sign_outs: AtomicU64,
    /// Server metadata
    pub start_time: Instant,
    pub port: u16,
    pub host: String,
    /// Last action tracking
    pub last_action: Mutex<Option<String>>,
    pub last_action_time: Mutex<Option<DateTime<Utc>>>,
}

impl AppState {
    pub fn new(port: u16, host: String, durations: ModeDurations, backends: Backends) -> Self {
        let store = Arc::new(TimerStore::new(backends.storage, backends.clock));
        let (widget_view_tx, _) = watch::channel(WidgetView::default());

        Self {
            store,
            bus: SignalBus::new(),
            auth: AuthState::new(),
            router: RouterState::default(),
            durations,
            sessions: backends.sessions,
            sound: backends.sound,
            notifications: Notifications::new(),
            mounted_engine: Mutex::new(None),
            widget_view_tx,
            handled_sign_outs: AtomicU64::new(0),
            start_time: Instant::now(),
            port,
            host,
            last_action: Mutex::new(None),
            last_action_time: Mutex::new(None),
        }
    }

    pub fn now_ms(&self) -> i64 {
        self.store.now_ms()
    }

    /// Remember the most recent user-visible action
    pub fn record_action(&self, action: &str) {
        if let Ok(mut last_action) = self.last_action.lock() {
            *last_action = Some(action.to_string());
        }
        if let Ok(mut last_time) = self.last_action_time.lock() {
            *last_time = Some(Utc::now());
        }
    }

    /// Get last action information
    pub fn get_last_action(&self) -> (Option<String>, Option<DateTime<Utc>>) {
        let last_action = self.last_action.lock().ok().and_then(|a| a.clone());
        let last_action_time = self.last_action_time.lock().ok().and_then(|t| *t);
        (last_action, last_action_time)
    }

    /// Calculate server uptime as a formatted string
    pub fn get_uptime(&self) -> String {
        let duration = self.start_time.elapsed();
        let hours = duration.as_secs() / 3600;
        let minutes = (duration.as_secs() % 3600) / 60;
        let seconds = duration.as_secs() % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }

    pub fn widget_view(&self) -> WidgetView {
        self.widget_view_tx.borrow().clone()
    }

    pub fn is_engine_mounted(&self) -> bool {
        self.mounted_engine.lock().map(|m| m.is_some()).unwrap_or(false)
    }

    /// Send an action to the mounted timer engine and wait for its answer
    pub async fn engine_request(&self, action: EngineAction) -> TimerResult<EngineStatus> {
        let commands = {
            let mounted = self.mounted_engine.lock()
                .map_err(|_| TimerError::Lock("mounted engine"))?;
            mounted.as_ref().map(|m| m.commands.clone()).ok_or(TimerError::NotMounted)?
        };

        let (reply, reply_rx) = oneshot::channel();
        commands
            .send(EngineCommand { action, reply })
            .await
            .map_err(|_| TimerError::EngineGone)?;

        reply_rx.await.map_err(|_| TimerError::EngineGone)?
    }

    /// Swap the mounted engine, returning the previous one
    pub fn replace_mounted_engine(&self, engine: Option<MountedEngine>) -> Option<MountedEngine> {
        match self.mounted_engine.lock() {
            Ok(mut mounted) => std::mem::replace(&mut *mounted, engine),
            Err(e) => {
                warn!("Failed to lock mounted engine: {}", e);
                None
            }
        }
    }

    /// Log the configured durations
    pub fn log_durations(&self) {
        info!(
            "Durations: focus={}s, short break={}s, long break={}s",
            self.durations.focus_secs, self.durations.short_break_secs, self.durations.long_break_secs
        );
    }
}
