//! Pomodoro Sync - A state-managed pomodoro timer
//! 
//! This is the main entry point for the pomodoro-sync application.

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use pomodoro_sync::{
    api::create_router,
    config::Config,
    services::{CommandSoundPlayer, FileSessionRecorder, SilentPlayer, SoundPlayer},
    state::{AppState, Backends},
    storage::FileStorage,
    tasks::run_status_widget,
    utils::{shutdown_signal, SystemClock},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("pomodoro_sync={},tower_http=info", config.log_level()))
        .init();

    info!("Starting pomodoro-sync server v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration: host={}, port={}, state={}, sessions={}",
          config.host, config.port, config.state_file.display(), config.sessions_file.display());

    let sound: Arc<dyn SoundPlayer> = match &config.completion_sound {
        Some(command) => Arc::new(CommandSoundPlayer::new(command.clone())),
        None => Arc::new(SilentPlayer),
    };
    let backends = Backends {
        storage: Arc::new(FileStorage::new(&config.state_file)),
        clock: Arc::new(SystemClock),
        sessions: Arc::new(FileSessionRecorder::new(&config.sessions_file)),
        sound,
    };

    // Create application state
    let state = Arc::new(AppState::new(config.port, config.host.clone(), config.durations(), backends));
    state.log_durations();

    // Storage-change notifications become bus signals
    let store = Arc::clone(&state.store);
    let bus = state.bus.clone();
    tokio::spawn(async move {
        store.forward_storage_events(bus).await;
    });

    // The status widget is mounted globally
    let widget_state = Arc::clone(&state);
    tokio::spawn(async move {
        run_status_widget(widget_state).await;
    });

    // Create HTTP router with all endpoints
    let app = create_router(state);

    // Bind to the specified address
    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  POST /navigate            - Change route (/pomodoro mounts the timer view)");
    info!("  POST /auth/sign-in        - Sign in");
    info!("  POST /auth/sign-out       - Sign out");
    info!("  POST /timer/{{start,pause,resume,toggle,stop}}");
    info!("  POST /timer/mode/:mode    - Switch to focus, shortBreak or longBreak");
    info!("  POST /widget/{{toggle,stop,open-timer}}");
    info!("  GET  /status              - Timer, widget and route status");
    info!("  GET  /sessions            - Completed sessions");
    info!("  GET  /health              - Health check");

    // Setup graceful shutdown
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    info!("Server shutdown complete");
    Ok(())
}
