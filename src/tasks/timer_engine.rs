//! Timer engine for the dedicated timer view
//!
//! The engine owns the countdown while the timer view is mounted. It keeps an
//! in-memory remaining count advanced once per second, writes every state
//! transition through the [`TimerStore`](crate::state::TimerStore) and follows
//! remote changes announced on the signal bus.

use std::{sync::Arc, time::Duration};

use serde::Serialize;
use tokio::{
    sync::{broadcast::error::RecvError, mpsc, oneshot},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tracing::{debug, error, info, warn};

use crate::{
    bus::Signal,
    error::TimerResult,
    services::SessionRecord,
    shell::NavigationState,
    state::{AppState, TimerMode, TimerPhase, TimerState, VersionedTimerState},
    utils::{format_mmss, seconds_until},
};

/// Actions the timer view can perform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineAction {
    Start { task_id: Option<String> },
    Pause,
    Resume,
    Toggle,
    Stop,
    SwitchMode(TimerMode),
    Status,
}

/// A request sent to the mounted engine
#[derive(Debug)]
pub struct EngineCommand {
    pub action: EngineAction,
    pub reply: oneshot::Sender<TimerResult<EngineStatus>>,
}

/// What the timer view currently shows
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatus {
    pub mode: TimerMode,
    pub remaining_secs: u32,
    pub display: String,
    pub active: bool,
    pub ticking: bool,
    pub task_id: Option<String>,
}

/// A countdown that reached zero
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub mode: TimerMode,
    pub duration_secs: u32,
    pub task_id: Option<String>,
}

/// Handle to a running engine task
#[derive(Debug)]
pub struct MountedEngine {
    pub commands: mpsc::Sender<EngineCommand>,
    unmount_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl MountedEngine {
    /// Stop the engine task; in-flight session saves keep running
    pub fn unmount(self) -> JoinHandle<()> {
        let _ = self.unmount_tx.send(());
        self.handle
    }
}

/// Countdown state machine of the timer view
pub struct TimerEngine {
    app: Arc<AppState>,
    mode: TimerMode,
    remaining_secs: u32,
    active: bool,
    ticking: bool,
    task_id: Option<String>,
    seen_version: u64,
}

impl TimerEngine {
    /// Mount the engine, reconciling with whatever state is already persisted
    pub fn mount(app: Arc<AppState>, navigation: Option<NavigationState>) -> TimerResult<Self> {
        let preserve = navigation.map_or(false, |nav| nav.preserve_timer_state);
        let handoff = if preserve { app.store.take_handoff()? } else { None };
        let snapshot = app.store.snapshot()?;
        let mode = snapshot.state.mode;

        let mut engine = Self {
            remaining_secs: app.durations.duration_secs(mode),
            app,
            mode,
            active: false,
            ticking: false,
            task_id: None,
            seen_version: snapshot.version,
        };

        if snapshot.state.is_active() {
            engine.apply(&snapshot);
            if preserve {
                info!(
                    "Timer view mounted, preserving {} remaining (handoff: {:?})",
                    format_mmss(engine.remaining_secs),
                    handoff.map(|h| h.remaining_secs)
                );
            } else {
                info!("Timer view mounted, adopting active timer");
            }
        } else if let Some(remaining_secs) = navigation.filter(|_| preserve).and_then(|nav| nav.remaining_secs) {
            // Persisted state was lost; fall back to the navigation parameters
            let paused = navigation.map_or(false, |nav| nav.paused);
            warn!("No persisted timer on mount, restoring {}s from navigation", remaining_secs);
            let state = if paused {
                TimerState::paused(mode, remaining_secs)
            } else {
                TimerState::running_for(mode, remaining_secs, engine.app.now_ms())
            };
            let snapshot = engine.app.store.set("restore", state)?;
            engine.apply(&snapshot);
        } else {
            debug!("Timer view mounted idle in {} mode", mode);
        }

        Ok(engine)
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            mode: self.mode,
            remaining_secs: self.remaining_secs,
            display: format_mmss(self.remaining_secs),
            active: self.active,
            ticking: self.ticking,
            task_id: self.task_id.clone(),
        }
    }

    pub fn is_ticking(&self) -> bool {
        self.ticking
    }

    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    pub fn handle(&mut self, action: EngineAction) -> TimerResult<EngineStatus> {
        match action {
            EngineAction::Start { task_id } => self.start(task_id),
            EngineAction::Pause => self.pause(),
            EngineAction::Resume => self.resume(),
            EngineAction::Toggle => self.toggle(),
            EngineAction::Stop => self.stop(),
            EngineAction::SwitchMode(mode) => self.switch_mode(mode),
            EngineAction::Status => Ok(self.status()),
        }
    }

    /// Start counting down from the current remaining time
    pub fn start(&mut self, task_id: Option<String>) -> TimerResult<EngineStatus> {
        if task_id.is_some() {
            self.task_id = task_id;
        }
        if self.ticking {
            return Ok(self.status());
        }
        if self.active {
            return self.resume();
        }
        if self.remaining_secs == 0 {
            self.remaining_secs = self.full_duration();
        }

        let snapshot = self.app.store.start(self.mode, self.remaining_secs)?;
        self.apply(&snapshot);
        info!("Timer started: {} for {}", self.mode, format_mmss(self.remaining_secs));
        self.app.bus.publish_toggle(snapshot.version);
        Ok(self.status())
    }

    /// Freeze the countdown and persist the remaining snapshot
    pub fn pause(&mut self) -> TimerResult<EngineStatus> {
        if !self.ticking {
            return Ok(self.status());
        }

        let snapshot = self.app.store.set("pause", TimerState::paused(self.mode, self.remaining_secs))?;
        self.apply(&snapshot);
        info!("Timer paused at {}", format_mmss(self.remaining_secs));
        self.app.bus.publish_toggle(snapshot.version);
        Ok(self.status())
    }

    /// Continue from the persisted snapshot
    pub fn resume(&mut self) -> TimerResult<EngineStatus> {
        if self.ticking {
            return Ok(self.status());
        }
        if !self.active {
            return self.start(None);
        }

        let snapshot = self.app.store.resume()?;
        if !snapshot.state.is_active() {
            // Someone stopped the timer underneath us
            self.apply(&snapshot);
            return Ok(self.status());
        }
        self.apply(&snapshot);
        info!("Timer resumed at {}", format_mmss(self.remaining_secs));
        self.app.bus.publish_toggle(snapshot.version);
        Ok(self.status())
    }

    pub fn toggle(&mut self) -> TimerResult<EngineStatus> {
        if self.ticking {
            self.pause()
        } else {
            self.resume()
        }
    }

    /// Clear all persisted timer state and reset the countdown
    pub fn stop(&mut self) -> TimerResult<EngineStatus> {
        let snapshot = self.app.store.clear()?;
        self.seen_version = snapshot.version;
        self.reset();
        info!("Timer stopped");
        self.app.bus.publish(Signal::StopRequested { version: snapshot.version });
        Ok(self.status())
    }

    /// Change preset; resets the countdown and never auto-starts
    pub fn switch_mode(&mut self, mode: TimerMode) -> TimerResult<EngineStatus> {
        let was_active = self.active;
        let snapshot = self.app.store.set("switch mode", TimerState::idle(mode))?;
        self.seen_version = snapshot.version;
        self.mode = mode;
        self.reset();
        info!("Timer mode switched to {}", mode);
        if was_active {
            self.app.bus.publish(Signal::StopRequested { version: snapshot.version });
        }
        Ok(self.status())
    }

    /// Advance the countdown by one second; yields the completion exactly once
    pub fn tick(&mut self) -> TimerResult<Option<Completion>> {
        if !self.ticking {
            return Ok(None);
        }

        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        if self.remaining_secs > 0 {
            return Ok(None);
        }

        self.ticking = false;
        self.active = false;
        let snapshot = self.app.store.clear()?;
        self.seen_version = snapshot.version;

        Ok(Some(Completion {
            mode: self.mode,
            duration_secs: self.full_duration(),
            task_id: self.task_id.take(),
        }))
    }

    /// Re-derive the countdown if the signal announces a newer store version
    pub fn handle_signal(&mut self, signal: &Signal) -> TimerResult<()> {
        if !signal.is_newer_than(self.seen_version) {
            return Ok(());
        }
        self.resync()
    }

    /// Re-derive the countdown from the store if it moved since we last looked
    pub fn resync(&mut self) -> TimerResult<()> {
        let snapshot = self.app.store.snapshot()?;
        if snapshot.version <= self.seen_version {
            return Ok(());
        }
        debug!("Engine syncing to store v{}", snapshot.version);
        self.apply(&snapshot);
        Ok(())
    }

    fn apply(&mut self, snapshot: &VersionedTimerState) {
        self.seen_version = snapshot.version;
        match snapshot.state.phase {
            TimerPhase::Idle => {
                if self.active {
                    self.mode = snapshot.state.mode;
                    self.reset();
                }
            }
            TimerPhase::Running { ends_at_ms } => {
                self.mode = snapshot.state.mode;
                self.remaining_secs = seconds_until(ends_at_ms, self.app.now_ms());
                self.active = true;
                self.ticking = true;
            }
            TimerPhase::Paused { remaining_secs } => {
                self.mode = snapshot.state.mode;
                self.remaining_secs = remaining_secs;
                self.active = true;
                self.ticking = false;
            }
        }
    }

    fn reset(&mut self) {
        self.active = false;
        self.ticking = false;
        self.task_id = None;
        self.remaining_secs = self.full_duration();
    }

    fn full_duration(&self) -> u32 {
        self.app.durations.duration_secs(self.mode)
    }
}

/// Fire the completion side effects without waiting for them
pub fn dispatch_completion(app: &Arc<AppState>, completion: Completion) {
    info!("{} session complete", completion.mode.label());
    app.record_action("complete");
    app.notifications.info(format!("{} session complete", completion.mode.label()));

    match app.auth.current_user() {
        Some(user) => {
            let record = SessionRecord::new(
                &user.id,
                completion.mode,
                completion.duration_secs,
                completion.task_id,
            );
            let save = app.sessions.save(record);
            let app = Arc::clone(app);
            tokio::spawn(async move {
                if let Err(e) = save.await {
                    error!("Failed to save completed session: {}", e);
                    app.notifications.error(format!("Could not save your session: {}", e));
                }
            });
        }
        None => debug!("No signed-in user, session not recorded"),
    }

    let play = app.sound.play();
    tokio::spawn(async move {
        if let Err(e) = play.await {
            debug!("Completion sound failed: {}", e);
        }
    });
}

/// Mount the engine and spawn its run loop
pub fn mount_engine(app: &Arc<AppState>, navigation: Option<NavigationState>) -> TimerResult<MountedEngine> {
    let engine = TimerEngine::mount(Arc::clone(app), navigation)?;
    let (commands, commands_rx) = mpsc::channel(16);
    let (unmount_tx, unmount_rx) = oneshot::channel();
    let handle = tokio::spawn(run_timer_engine(engine, commands_rx, unmount_rx));

    Ok(MountedEngine {
        commands,
        unmount_tx,
        handle,
    })
}

/// Engine run loop: one-second ticks, view commands and bus signals
pub async fn run_timer_engine(
    mut engine: TimerEngine,
    mut commands: mpsc::Receiver<EngineCommand>,
    mut unmount: oneshot::Receiver<()>,
) {
    let app = Arc::clone(&engine.app);
    let mut signals = app.bus.subscribe();

    let mut interval = tokio::time::interval(Duration::from_secs(1));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.reset();

    loop {
        tokio::select! {
            _ = &mut unmount => {
                debug!("Timer engine unmounting");
                break;
            }

            _ = interval.tick() => {
                match engine.tick() {
                    Ok(Some(completion)) => dispatch_completion(&app, completion),
                    Ok(None) => {}
                    Err(e) => error!("Timer tick failed: {}", e),
                }
            }

            Some(command) = commands.recv() => {
                let was_ticking = engine.is_ticking();
                let result = engine.handle(command.action);
                if engine.is_ticking() && !was_ticking {
                    interval.reset();
                }
                if command.reply.send(result).is_err() {
                    debug!("Engine command caller went away");
                }
            }

            received = signals.recv() => {
                let was_ticking = engine.is_ticking();
                let result = match received {
                    Ok(signal) => engine.handle_signal(&signal),
                    Err(RecvError::Lagged(skipped)) => {
                        debug!("Engine lagged {} signals, resyncing", skipped);
                        engine.resync()
                    }
                    Err(RecvError::Closed) => break,
                };
                if let Err(e) = result {
                    warn!("Engine failed to follow remote change: {}", e);
                }
                if engine.is_ticking() && !was_ticking {
                    interval.reset();
                }
            }
        }
    }
}
