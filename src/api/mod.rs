//! HTTP API module
//! 
//! This module contains all HTTP endpoint handlers and response structures.

pub mod handlers;
pub mod responses;

use std::sync::Arc;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use handlers::*;

/// Create the HTTP router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/status", get(status_handler))
        .route("/health", get(health_handler))
        .route("/navigate", post(navigate_handler))
        .route("/auth/sign-in", post(sign_in_handler))
        .route("/auth/sign-out", post(sign_out_handler))
        // Timer view controls
        .route("/timer/start", post(timer_start_handler))
        .route("/timer/pause", post(timer_pause_handler))
        .route("/timer/resume", post(timer_resume_handler))
        .route("/timer/toggle", post(timer_toggle_handler))
        .route("/timer/stop", post(timer_stop_handler))
        .route("/timer/mode/:mode", post(timer_mode_handler))
        .route("/timer", get(timer_status_handler))
        // Status widget controls
        .route("/widget", get(widget_handler))
        .route("/widget/toggle", post(widget_toggle_handler))
        .route("/widget/stop", post(widget_stop_handler))
        .route("/widget/open-timer", post(widget_open_timer_handler))
        .route("/sessions", get(sessions_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
