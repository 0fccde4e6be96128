//! API response structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    services::Notification,
    shell::{NavigationState, Route, User},
    state::VersionedTimerState,
    tasks::{EngineStatus, WidgetView},
};

/// Response for actions that change the timer store
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub timer: VersionedTimerState,
}

impl ApiResponse {
    pub fn new(status: &str, message: String, timer: VersionedTimerState) -> Self {
        Self {
            status: status.to_string(),
            message,
            timestamp: Utc::now(),
            timer,
        }
    }

    pub fn ok(message: String, timer: VersionedTimerState) -> Self {
        Self::new("ok", message, timer)
    }
}

/// Response for timer view actions
#[derive(Debug, Clone, Serialize)]
pub struct EngineResponse {
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub engine: EngineStatus,
}

impl EngineResponse {
    pub fn new(message: &str, engine: EngineStatus) -> Self {
        Self {
            message: message.to_string(),
            timestamp: Utc::now(),
            engine,
        }
    }
}

/// Response for widget actions
#[derive(Debug, Clone, Serialize)]
pub struct WidgetResponse {
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub widget: WidgetView,
    pub route: Route,
}

/// Full status snapshot
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub timer: VersionedTimerState,
    pub timer_remaining_seconds: Option<u32>,
    pub widget: WidgetView,
    pub route: Route,
    pub user: Option<User>,
    pub engine_mounted: bool,
    pub notifications: Vec<Notification>,
    pub uptime: String,
    pub port: u16,
    pub host: String,
    pub last_action: Option<String>,
    pub last_action_time: Option<DateTime<Utc>>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

impl HealthResponse {
    /// Create a new health response
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NavigateRequest {
    pub path: String,
    #[serde(default)]
    pub state: Option<NavigationState>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NavigateResponse {
    pub route: Route,
    pub engine_mounted: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignInRequest {
    pub user_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StartRequest {
    #[serde(default)]
    pub task_id: Option<String>,
}
