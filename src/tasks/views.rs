//! View mounting driven by navigation
//!
//! The timer engine only exists while the timer route is showing. Every
//! navigation goes through [`navigate`], which mounts or unmounts the engine
//! before returning so that commands sent right after a navigation find it.

use std::sync::Arc;

use tracing::{error, info};

use super::timer_engine::mount_engine;
use crate::{
    shell::{NavigationState, Route},
    state::AppState,
};

/// Change route and bring the mounted views in line with it
pub fn navigate(app: &Arc<AppState>, path: &str, state: Option<NavigationState>) -> Route {
    let route = app.router.navigate(path, state);
    app.record_action(&format!("navigate {}", route.path()));
    sync_mounts(app);
    route
}

/// Mount the timer engine on the timer route, unmount it everywhere else
pub fn sync_mounts(app: &Arc<AppState>) {
    let on_timer = app.router.current_route().is_timer();

    if on_timer {
        if app.is_engine_mounted() {
            // Re-navigation to the timer view keeps the mounted engine
            let _ = app.router.take_navigation_state();
            return;
        }

        let navigation = app.router.take_navigation_state();
        match mount_engine(app, navigation) {
            Ok(engine) => {
                info!("Timer view mounted");
                if let Some(previous) = app.replace_mounted_engine(Some(engine)) {
                    let _ = previous.unmount();
                }
            }
            Err(e) => error!("Failed to mount timer view: {}", e),
        }
    } else if let Some(engine) = app.replace_mounted_engine(None) {
        info!("Timer view unmounted");
        let _ = engine.unmount();
    }
}
