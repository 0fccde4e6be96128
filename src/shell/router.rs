//! Current route and navigate-with-state

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{info, warn};

pub const TIMER_PATH: &str = "/pomodoro";
pub const AUTH_PATH: &str = "/auth";

/// Where the user currently is
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "view", content = "path", rename_all = "camelCase")]
pub enum Route {
    Timer,
    Auth,
    Other(String),
}

impl Route {
    pub fn from_path(path: &str) -> Self {
        let trimmed = path.trim_end_matches('/');
        match trimmed {
            TIMER_PATH => Route::Timer,
            AUTH_PATH => Route::Auth,
            "" => Route::Other("/".to_string()),
            other => Route::Other(other.to_string()),
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Route::Timer => TIMER_PATH,
            Route::Auth => AUTH_PATH,
            Route::Other(path) => path,
        }
    }

    pub fn is_timer(&self) -> bool {
        matches!(self, Route::Timer)
    }
}

/// State passed along with a navigation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationState {
    #[serde(default)]
    pub preserve_timer_state: bool,
    #[serde(default)]
    pub remaining_secs: Option<u32>,
    #[serde(default)]
    pub paused: bool,
}

/// Current route plus the state of the last navigation
#[derive(Debug)]
pub struct RouterState {
    route_tx: watch::Sender<Route>,
    pending_state: Mutex<Option<NavigationState>>,
}

impl RouterState {
    pub fn new(initial: Route) -> Self {
        let (route_tx, _) = watch::channel(initial);
        Self {
            route_tx,
            pending_state: Mutex::new(None),
        }
    }

    pub fn current_route(&self) -> Route {
        self.route_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Route> {
        self.route_tx.subscribe()
    }

    /// Navigate to `path`, optionally carrying state for the destination view
    pub fn navigate(&self, path: &str, state: Option<NavigationState>) -> Route {
        let route = Route::from_path(path);
        match self.pending_state.lock() {
            Ok(mut pending) => *pending = state,
            Err(e) => warn!("Failed to lock navigation state: {}", e),
        }
        info!("Navigating to {}", route.path());
        self.route_tx.send_replace(route.clone());
        route
    }

    /// Consume the state carried by the last navigation
    pub fn take_navigation_state(&self) -> Option<NavigationState> {
        self.pending_state.lock().ok().and_then(|mut pending| pending.take())
    }
}

impl Default for RouterState {
    fn default() -> Self {
        Self::new(Route::Other("/".to_string()))
    }
}
