//! HTTP endpoint handlers

use std::sync::Arc;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use tracing::{error, info, warn};

use crate::{
    error::TimerError,
    services::SessionRecord,
    shell::User,
    state::{AppState, TimerMode},
    tasks::{navigate, EngineAction, StatusWidget, WidgetView},
};
use super::responses::{
    ApiResponse, EngineResponse, HealthResponse, NavigateRequest, NavigateResponse, SignInRequest,
    StartRequest, StatusResponse, WidgetResponse,
};

/// Map a timer error to the HTTP status the caller should see
fn error_status(e: &TimerError) -> StatusCode {
    match e {
        TimerError::NotMounted | TimerError::Inactive | TimerError::WidgetHidden => StatusCode::CONFLICT,
        TimerError::UnknownMode(_) => StatusCode::BAD_REQUEST,
        TimerError::Lock(_) | TimerError::EngineGone => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn reject(action: &str, e: TimerError) -> StatusCode {
    let status = error_status(&e);
    if status.is_server_error() {
        error!("Failed to {}: {}", action, e);
    } else {
        warn!("Rejected {}: {}", action, e);
    }
    status
}

/// Handle GET /status - Return the full timer, widget and shell status
pub async fn status_handler(State(state): State<Arc<AppState>>) -> Result<Json<StatusResponse>, StatusCode> {
    let timer = state.store.snapshot().map_err(|e| reject("read timer state", e))?;
    let (last_action, last_action_time) = state.get_last_action();

    Ok(Json(StatusResponse {
        timer,
        timer_remaining_seconds: timer.state.remaining_secs(state.now_ms()),
        widget: state.widget_view(),
        route: state.router.current_route(),
        user: state.auth.current_user(),
        engine_mounted: state.is_engine_mounted(),
        notifications: state.notifications.list(),
        uptime: state.get_uptime(),
        port: state.port,
        host: state.host.clone(),
        last_action,
        last_action_time,
    }))
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}

/// Handle POST /navigate - Change route, mounting or unmounting the timer view
pub async fn navigate_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<NavigateRequest>,
) -> Json<NavigateResponse> {
    let route = navigate(&state, &request.path, request.state);
    Json(NavigateResponse {
        route,
        engine_mounted: state.is_engine_mounted(),
    })
}

/// Handle POST /auth/sign-in
pub async fn sign_in_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SignInRequest>,
) -> Result<Json<User>, StatusCode> {
    let user_id = request.user_id.trim();
    if user_id.is_empty() {
        warn!("Rejected sign-in with empty user id");
        return Err(StatusCode::BAD_REQUEST);
    }
    state.record_action("sign-in");
    Ok(Json(state.auth.sign_in(user_id)))
}

/// Handle POST /auth/sign-out - Timer state is cleared before responding
pub async fn sign_out_handler(State(state): State<Arc<AppState>>) -> Result<Json<ApiResponse>, StatusCode> {
    state.auth.sign_out();
    state.record_action("sign-out");
    StatusWidget::new(Arc::clone(&state))
        .sync_sign_outs()
        .map_err(|e| reject("clear timer on sign-out", e))?;
    let timer = state.store.snapshot().map_err(|e| reject("read timer state", e))?;
    Ok(Json(ApiResponse::ok("Signed out".to_string(), timer)))
}

async fn engine_action(
    state: &AppState,
    action: EngineAction,
    name: &str,
    message: &str,
) -> Result<Json<EngineResponse>, StatusCode> {
    match state.engine_request(action).await {
        Ok(engine) => {
            info!("Timer {} via API", name);
            state.record_action(name);
            Ok(Json(EngineResponse::new(message, engine)))
        }
        Err(e) => Err(reject(name, e)),
    }
}

/// Handle POST /timer/start - Start the countdown on the timer view
pub async fn timer_start_handler(
    State(state): State<Arc<AppState>>,
    request: Option<Json<StartRequest>>,
) -> Result<Json<EngineResponse>, StatusCode> {
    let task_id = request.and_then(|Json(request)| request.task_id);
    engine_action(&state, EngineAction::Start { task_id }, "start", "Timer started").await
}

/// Handle POST /timer/pause
pub async fn timer_pause_handler(State(state): State<Arc<AppState>>) -> Result<Json<EngineResponse>, StatusCode> {
    engine_action(&state, EngineAction::Pause, "pause", "Timer paused").await
}

/// Handle POST /timer/resume
pub async fn timer_resume_handler(State(state): State<Arc<AppState>>) -> Result<Json<EngineResponse>, StatusCode> {
    engine_action(&state, EngineAction::Resume, "resume", "Timer resumed").await
}

/// Handle POST /timer/toggle
pub async fn timer_toggle_handler(State(state): State<Arc<AppState>>) -> Result<Json<EngineResponse>, StatusCode> {
    engine_action(&state, EngineAction::Toggle, "toggle", "Timer toggled").await
}

/// Handle POST /timer/stop
pub async fn timer_stop_handler(State(state): State<Arc<AppState>>) -> Result<Json<EngineResponse>, StatusCode> {
    engine_action(&state, EngineAction::Stop, "stop", "Timer stopped").await
}

/// Handle POST /timer/mode/:mode - Switch preset without starting
pub async fn timer_mode_handler(
    State(state): State<Arc<AppState>>,
    Path(mode): Path<String>,
) -> Result<Json<EngineResponse>, StatusCode> {
    let mode: TimerMode = mode.parse().map_err(|e| reject("switch mode", e))?;
    engine_action(&state, EngineAction::SwitchMode(mode), "switch mode", "Timer mode switched").await
}

/// Handle GET /timer - What the timer view shows
pub async fn timer_status_handler(State(state): State<Arc<AppState>>) -> Result<Json<EngineResponse>, StatusCode> {
    state
        .engine_request(EngineAction::Status)
        .await
        .map(|engine| Json(EngineResponse::new("Timer view status", engine)))
        .map_err(|e| reject("read timer view", e))
}

/// Handle GET /widget - Current widget rendering
pub async fn widget_handler(State(state): State<Arc<AppState>>) -> Result<Json<WidgetView>, StatusCode> {
    StatusWidget::new(state)
        .refresh()
        .map(Json)
        .map_err(|e| reject("render widget", e))
}

fn widget_response(state: &AppState, message: &str, widget: WidgetView) -> Json<WidgetResponse> {
    Json(WidgetResponse {
        message: message.to_string(),
        timestamp: chrono::Utc::now(),
        widget,
        route: state.router.current_route(),
    })
}

/// Handle POST /widget/toggle - Pause or resume from any view
pub async fn widget_toggle_handler(State(state): State<Arc<AppState>>) -> Result<Json<WidgetResponse>, StatusCode> {
    let widget = StatusWidget::new(Arc::clone(&state))
        .toggle()
        .map_err(|e| reject("toggle from widget", e))?;
    let message = if widget.paused { "Timer paused" } else { "Timer resumed" };
    Ok(widget_response(&state, message, widget))
}

/// Handle POST /widget/stop - Stop from any view
pub async fn widget_stop_handler(State(state): State<Arc<AppState>>) -> Result<Json<WidgetResponse>, StatusCode> {
    let widget = StatusWidget::new(Arc::clone(&state))
        .stop()
        .map_err(|e| reject("stop from widget", e))?;
    Ok(widget_response(&state, "Timer stopped", widget))
}

/// Handle POST /widget/open-timer - Hand off to the timer view
pub async fn widget_open_timer_handler(State(state): State<Arc<AppState>>) -> Result<Json<WidgetResponse>, StatusCode> {
    let widget = StatusWidget::new(Arc::clone(&state));
    widget.open_timer().map_err(|e| reject("open timer view", e))?;
    let view = widget.view().map_err(|e| reject("render widget", e))?;
    Ok(widget_response(&state, "Timer view opened", view))
}

/// Handle GET /sessions - Completed sessions recorded so far
pub async fn sessions_handler(State(state): State<Arc<AppState>>) -> Result<Json<Vec<SessionRecord>>, StatusCode> {
    state.sessions.list().await.map(Json).map_err(|e| {
        error!("Failed to list sessions: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}
