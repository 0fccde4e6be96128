//! Global timer status widget
//!
//! Mirrors the timer store from every view except the timer and auth views and
//! offers pause/resume, stop and "open timer" controls. The widget never owns
//! the countdown: it writes through the store and announces what it did.

use std::{
    sync::{atomic::Ordering, Arc},
    time::Duration,
};

use serde::Serialize;
use tokio::{sync::broadcast::error::RecvError, time::MissedTickBehavior};
use tracing::{debug, info, warn};

use super::views::navigate;
use crate::{
    bus::Signal,
    error::{TimerError, TimerResult},
    shell::{NavigationState, Route, TIMER_PATH},
    state::{AppState, TimerMode, TimerState},
    utils::format_mmss,
};

/// Rendered widget; a hidden widget carries no timer data
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetView {
    pub visible: bool,
    pub mode: Option<TimerMode>,
    pub paused: bool,
    pub remaining_secs: Option<u32>,
    pub display: Option<String>,
    pub version: u64,
}

impl WidgetView {
    fn hidden(version: u64) -> Self {
        Self {
            version,
            ..Self::default()
        }
    }
}

/// The widget shows only for an active timer, a signed-in user and a route
/// other than the timer or auth view
pub fn is_widget_visible(state: &TimerState, signed_in: bool, route: &Route) -> bool {
    state.is_active() && signed_in && !matches!(route, Route::Timer | Route::Auth)
}

/// Handle for rendering and operating the widget
#[derive(Clone)]
pub struct StatusWidget {
    app: Arc<AppState>,
}

impl StatusWidget {
    pub fn new(app: Arc<AppState>) -> Self {
        Self { app }
    }

    /// Render from the current store snapshot
    pub fn view(&self) -> TimerResult<WidgetView> {
        let snapshot = self.app.store.snapshot()?;
        let signed_in = self.app.auth.is_signed_in();
        let route = self.app.router.current_route();

        if !is_widget_visible(&snapshot.state, signed_in, &route) {
            return Ok(WidgetView::hidden(snapshot.version));
        }

        let remaining_secs = snapshot.state.remaining_secs(self.app.now_ms());
        Ok(WidgetView {
            visible: true,
            mode: Some(snapshot.state.mode),
            paused: snapshot.state.is_paused(),
            remaining_secs,
            display: remaining_secs.map(format_mmss),
            version: snapshot.version,
        })
    }

    /// Re-render and publish the result
    pub fn refresh(&self) -> TimerResult<WidgetView> {
        let view = self.view()?;
        self.app.widget_view_tx.send_if_modified(|current| {
            if *current == view {
                false
            } else {
                *current = view.clone();
                true
            }
        });
        Ok(view)
    }

    pub fn is_visible(&self) -> TimerResult<bool> {
        Ok(self.view()?.visible)
    }

    fn ensure_visible(&self) -> TimerResult<()> {
        if self.is_visible()? {
            Ok(())
        } else {
            Err(TimerError::WidgetHidden)
        }
    }

    /// Pause or resume from outside the timer view
    pub fn toggle(&self) -> TimerResult<WidgetView> {
        self.ensure_visible()?;
        let snapshot = self.app.store.toggle()?;
        info!(
            "Widget {} timer",
            if snapshot.state.is_paused() { "paused" } else { "resumed" }
        );
        self.app.record_action("widget toggle");
        self.app.bus.publish_toggle(snapshot.version);
        self.refresh()
    }

    /// Stop the timer from outside the timer view
    pub fn stop(&self) -> TimerResult<WidgetView> {
        self.ensure_visible()?;
        let snapshot = self.app.store.clear()?;
        info!("Widget stopped timer");
        self.app.record_action("widget stop");
        self.app.bus.publish(Signal::StopRequested { version: snapshot.version });
        self.refresh()
    }

    /// Hand the current countdown to the timer view and navigate there
    pub fn open_timer(&self) -> TimerResult<Route> {
        self.ensure_visible()?;
        let handoff = self.app.store.mark_handoff()?;
        let navigation = NavigationState {
            preserve_timer_state: true,
            remaining_secs: handoff.map(|h| h.remaining_secs),
            paused: handoff.map_or(false, |h| h.paused),
        };

        info!("Widget opening timer view with {:?}s remaining", navigation.remaining_secs);
        let route = navigate(&self.app, TIMER_PATH, Some(navigation));
        self.refresh()?;
        Ok(route)
    }

    /// Run the sign-out cleanup if a user went away since it last ran.
    /// Returns whether cleanup ran.
    pub fn sync_sign_outs(&self) -> TimerResult<bool> {
        let sign_outs = self.app.auth.sign_out_count();
        let handled = self.app.handled_sign_outs.swap(sign_outs, Ordering::SeqCst);
        if sign_outs == handled {
            return Ok(false);
        }
        self.handle_sign_out()?;
        Ok(true)
    }

    /// Clear every timer key once the user is gone; repeated calls are no-ops
    pub fn handle_sign_out(&self) -> TimerResult<WidgetView> {
        let before = self.app.store.snapshot()?.version;
        let snapshot = self.app.store.clear()?;
        if snapshot.version != before {
            info!("User signed out, cleared timer state");
            self.app.bus.publish(Signal::StopRequested { version: snapshot.version });
        }
        self.refresh()
    }
}

/// Widget run loop: one-second poll plus store, auth, route and bus listeners
pub async fn run_status_widget(app: Arc<AppState>) {
    let widget = StatusWidget::new(Arc::clone(&app));
    let mut store_rx = app.store.subscribe();
    let mut auth_rx = app.auth.subscribe();
    let mut route_rx = app.router.subscribe();
    let mut signals = app.bus.subscribe();

    let mut interval = tokio::time::interval(Duration::from_secs(1));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("Starting timer status widget");
    if let Err(e) = widget.sync_sign_outs() {
        warn!("Widget failed to clear timer on sign-out: {}", e);
    }
    let mut seen_version = refresh_logged(&widget).map_or(0, |view| view.version);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                // Pick up writes made by other processes sharing the storage
                if let Err(e) = app.store.sync_from_storage() {
                    warn!("Widget failed to sync storage: {}", e);
                }
                let paused = app.widget_view().paused;
                if !paused {
                    if let Some(view) = refresh_logged(&widget) {
                        seen_version = view.version;
                    }
                }
            }

            changed = store_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                if let Some(view) = refresh_logged(&widget) {
                    seen_version = view.version;
                }
            }

            changed = auth_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                // Counts, not values: a sign-out and sign-in may coalesce
                if let Err(e) = widget.sync_sign_outs() {
                    warn!("Widget failed to clear timer on sign-out: {}", e);
                }
                if let Some(view) = refresh_logged(&widget) {
                    seen_version = view.version;
                }
            }

            changed = route_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                if let Some(view) = refresh_logged(&widget) {
                    seen_version = view.version;
                }
            }

            received = signals.recv() => {
                match received {
                    Ok(signal) if signal.is_newer_than(seen_version) => {
                        debug!("Widget refreshing on {}", signal.name());
                        if let Some(view) = refresh_logged(&widget) {
                            seen_version = view.version;
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(_)) => {
                        if let Some(view) = refresh_logged(&widget) {
                            seen_version = view.version;
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }
}

fn refresh_logged(widget: &StatusWidget) -> Option<WidgetView> {
    match widget.refresh() {
        Ok(view) => Some(view),
        Err(e) => {
            warn!("Widget refresh failed: {}", e);
            None
        }
    }
}
