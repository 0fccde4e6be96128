//! Timer engine / status widget synchronization scenarios

use std::{sync::Arc, time::Duration};

use pomodoro_sync::{
    bus::Signal,
    error::TimerError,
    services::{MemorySessionRecorder, NotificationLevel, SilentPlayer},
    shell::{Route, TIMER_PATH},
    state::{AppState, Backends, ModeDurations, TimerMode, TimerState},
    storage::{
        KeyValueStore, MemoryStorage, KEY_PRESERVE_ON_MOUNT, KEY_TIMER_END_AT, KEY_TIMER_PAUSED,
        KEY_TIMER_REMAINING, TIMER_KEYS,
    },
    tasks::{
        dispatch_completion, is_widget_visible, navigate, run_status_widget, Completion,
        EngineAction, StatusWidget, TimerEngine,
    },
    utils::{Clock, ManualClock},
};

struct Harness {
    app: Arc<AppState>,
    clock: Arc<ManualClock>,
    storage: Arc<MemoryStorage>,
    sessions: MemorySessionRecorder,
}

fn harness_with(durations: ModeDurations, sessions: MemorySessionRecorder) -> Harness {
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    let storage = Arc::new(MemoryStorage::new());
    let backends = Backends {
        storage: storage.clone(),
        clock: clock.clone(),
        sessions: Arc::new(sessions.clone()),
        sound: Arc::new(SilentPlayer),
    };
    let app = Arc::new(AppState::new(0, "127.0.0.1".to_string(), durations, backends));
    Harness { app, clock, storage, sessions }
}

fn harness() -> Harness {
    harness_with(ModeDurations::default(), MemorySessionRecorder::new())
}

fn short_focus() -> ModeDurations {
    ModeDurations {
        focus_secs: 3,
        short_break_secs: 2,
        long_break_secs: 4,
    }
}

#[test]
fn test_start_pause_resume_keeps_remaining() {
    let h = harness();
    let mut engine = TimerEngine::mount(h.app.clone(), None).unwrap();

    let started = engine.start(None).unwrap();
    assert_eq!(started.remaining_secs, 1500);
    assert!(started.ticking);

    for _ in 0..10 {
        h.clock.advance_secs(1);
        assert!(engine.tick().unwrap().is_none());
    }

    let paused = engine.pause().unwrap();
    assert_eq!(paused.remaining_secs, 1490);
    assert!(paused.active);
    assert!(!paused.ticking);
    assert_eq!(h.storage.get(KEY_TIMER_REMAINING).unwrap().as_deref(), Some("1490"));
    assert_eq!(h.storage.get(KEY_TIMER_PAUSED).unwrap().as_deref(), Some("true"));

    // Five minutes of wall clock while paused must not count
    h.clock.advance_secs(300);
    assert!(engine.tick().unwrap().is_none());
    assert_eq!(engine.remaining_secs(), 1490);

    let resumed = engine.resume().unwrap();
    assert_eq!(resumed.remaining_secs, 1490);
    let snapshot = h.app.store.snapshot().unwrap();
    assert_eq!(snapshot.state.remaining_secs(h.clock.now_ms()), Some(1490));
}

#[test]
fn test_round_trip_for_any_remaining() {
    for remaining in [1u32, 59, 750, 1500] {
        let h = harness();
        h.app.store.start(TimerMode::Focus, remaining).unwrap();
        let mut engine = TimerEngine::mount(h.app.clone(), None).unwrap();
        assert_eq!(engine.remaining_secs(), remaining);

        engine.pause().unwrap();
        h.clock.advance_secs(3600);
        engine.resume().unwrap();
        assert_eq!(engine.remaining_secs(), remaining);
    }
}

#[test]
fn test_only_one_authoritative_field_persisted() {
    let h = harness();
    let mut engine = TimerEngine::mount(h.app.clone(), None).unwrap();

    engine.start(None).unwrap();
    assert!(h.storage.get(KEY_TIMER_END_AT).unwrap().is_some());
    assert!(h.storage.get(KEY_TIMER_REMAINING).unwrap().is_none());

    for _ in 0..30 {
        h.clock.advance_secs(1);
        engine.tick().unwrap();
        let computed = h.app.store.snapshot().unwrap().state.remaining_secs(h.clock.now_ms()).unwrap();
        assert!(computed.abs_diff(engine.remaining_secs()) <= 1);
    }

    engine.pause().unwrap();
    assert!(h.storage.get(KEY_TIMER_END_AT).unwrap().is_none());
    assert!(h.storage.get(KEY_TIMER_REMAINING).unwrap().is_some());
}

#[test]
fn test_zero_reach_completes_exactly_once() {
    let h = harness_with(short_focus(), MemorySessionRecorder::new());
    let mut engine = TimerEngine::mount(h.app.clone(), None).unwrap();
    engine.start(Some("task-42".to_string())).unwrap();

    assert!(engine.tick().unwrap().is_none());
    assert!(engine.tick().unwrap().is_none());
    let completion = engine.tick().unwrap();
    assert_eq!(
        completion,
        Some(Completion {
            mode: TimerMode::Focus,
            duration_secs: 3,
            task_id: Some("task-42".to_string()),
        })
    );

    assert!(!engine.is_ticking());
    assert!(!h.app.store.snapshot().unwrap().state.is_active());
    for key in TIMER_KEYS {
        assert_eq!(h.storage.get(key).unwrap(), None);
    }

    for _ in 0..5 {
        assert!(engine.tick().unwrap().is_none());
    }
}

#[tokio::test(start_paused = true)]
async fn test_mounted_engine_records_one_session() {
    let h = harness_with(short_focus(), MemorySessionRecorder::new());
    h.app.auth.sign_in("ada");
    navigate(&h.app, TIMER_PATH, None);

    let status = h.app
        .engine_request(EngineAction::Start { task_id: Some("write-report".to_string()) })
        .await
        .unwrap();
    assert_eq!(status.remaining_secs, 3);

    tokio::time::sleep(Duration::from_secs(5)).await;
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(h.sessions.attempts(), 1);
    let records = h.sessions.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].user_id, "ada");
    assert_eq!(records[0].mode, TimerMode::Focus);
    assert_eq!(records[0].duration_secs, 3);
    assert_eq!(records[0].task_id.as_deref(), Some("write-report"));

    let status = h.app.engine_request(EngineAction::Status).await.unwrap();
    assert!(!status.active);
    assert_eq!(status.remaining_secs, 0);
}

#[tokio::test]
async fn test_failed_session_save_is_reported_not_rolled_back() {
    let h = harness_with(short_focus(), MemorySessionRecorder::rejecting());
    h.app.auth.sign_in("ada");

    let mut engine = TimerEngine::mount(h.app.clone(), None).unwrap();
    engine.start(None).unwrap();
    let completion = (0..3).find_map(|_| engine.tick().unwrap()).unwrap();
    dispatch_completion(&h.app, completion);

    for _ in 0..10 {
        tokio::task::yield_now().await;
    }

    assert_eq!(h.sessions.attempts(), 1);
    assert!(h.app
        .notifications
        .list()
        .iter()
        .any(|n| n.level == NotificationLevel::Error));
    assert!(!h.app.store.snapshot().unwrap().state.is_active());
}

#[tokio::test]
async fn test_completion_without_user_skips_save() {
    let h = harness_with(short_focus(), MemorySessionRecorder::new());

    dispatch_completion(
        &h.app,
        Completion {
            mode: TimerMode::ShortBreak,
            duration_secs: 2,
            task_id: None,
        },
    );
    tokio::task::yield_now().await;

    assert_eq!(h.sessions.attempts(), 0);
    assert_eq!(h.app.get_last_action().0.as_deref(), Some("complete"));
}

#[test]
fn test_visibility_rule() {
    let active = TimerState::paused(TimerMode::Focus, 100);
    let idle = TimerState::idle(TimerMode::Focus);
    let elsewhere = Route::Other("/kanban".to_string());

    assert!(is_widget_visible(&active, true, &elsewhere));
    assert!(!is_widget_visible(&idle, true, &elsewhere));
    assert!(!is_widget_visible(&active, false, &elsewhere));
    assert!(!is_widget_visible(&active, true, &Route::Timer));
    assert!(!is_widget_visible(&active, true, &Route::Auth));
}

#[test]
fn test_widget_visibility_flips_with_each_condition() {
    let h = harness();
    let widget = StatusWidget::new(h.app.clone());
    h.app.router.navigate("/tasks", None);
    h.app.auth.sign_in("ada");
    assert!(!widget.view().unwrap().visible);

    h.app.store.start(TimerMode::Focus, 1500).unwrap();
    let view = widget.view().unwrap();
    assert!(view.visible);
    assert_eq!(view.display.as_deref(), Some("25:00"));

    h.app.router.navigate("/auth", None);
    assert!(!widget.view().unwrap().visible);
    h.app.router.navigate("/finance", None);
    assert!(widget.view().unwrap().visible);

    h.app.auth.sign_out();
    let hidden = widget.view().unwrap();
    assert!(!hidden.visible);
    assert_eq!(hidden.remaining_secs, None);
}

#[test]
fn test_widget_mirrors_running_and_paused_time() {
    let h = harness();
    let widget = StatusWidget::new(h.app.clone());
    h.app.auth.sign_in("ada");
    h.app.router.navigate("/", None);
    h.app.store.start(TimerMode::ShortBreak, 300).unwrap();

    h.clock.advance_secs(20);
    assert_eq!(widget.view().unwrap().remaining_secs, Some(280));

    let paused = widget.toggle().unwrap();
    assert!(paused.paused);
    assert_eq!(paused.remaining_secs, Some(280));

    h.clock.advance_secs(120);
    assert_eq!(widget.view().unwrap().remaining_secs, Some(280));
}

#[test]
fn test_widget_controls_require_visibility() {
    let h = harness();
    let widget = StatusWidget::new(h.app.clone());
    h.app.store.start(TimerMode::Focus, 1500).unwrap();

    assert!(matches!(widget.toggle(), Err(TimerError::WidgetHidden)));
    assert!(matches!(widget.stop(), Err(TimerError::WidgetHidden)));
    assert!(h.app.store.snapshot().unwrap().state.is_running());
}

#[test]
fn test_widget_stop_clears_and_signals() {
    let h = harness();
    let widget = StatusWidget::new(h.app.clone());
    let mut signals = h.app.bus.subscribe();
    h.app.auth.sign_in("ada");
    h.app.store.start(TimerMode::Focus, 1500).unwrap();

    let view = widget.stop().unwrap();
    assert!(!view.visible);
    for key in TIMER_KEYS {
        assert_eq!(h.storage.get(key).unwrap(), None);
    }
    assert!(matches!(signals.try_recv().unwrap(), Signal::StopRequested { .. }));
}

#[test]
fn test_engine_follows_widget_toggle() {
    let h = harness();
    let mut engine = TimerEngine::mount(h.app.clone(), None).unwrap();
    let mut signals = h.app.bus.subscribe();
    engine.start(None).unwrap();
    let _ = signals.try_recv();
    let _ = signals.try_recv();

    h.clock.advance_secs(5);
    let paused = h.app.store.toggle().unwrap();
    h.app.bus.publish_toggle(paused.version);

    let requested = signals.try_recv().unwrap();
    engine.handle_signal(&requested).unwrap();
    assert!(!engine.is_ticking());
    assert_eq!(engine.remaining_secs(), 1495);

    // The confirmation carries the same version and is ignored
    let confirmed = signals.try_recv().unwrap();
    assert_eq!(confirmed.version(), requested.version());
    engine.handle_signal(&confirmed).unwrap();
    assert_eq!(engine.remaining_secs(), 1495);

    let stopped = h.app.store.clear().unwrap();
    engine.handle_signal(&Signal::StopRequested { version: stopped.version }).unwrap();
    let status = engine.status();
    assert!(!status.active);
    assert_eq!(status.remaining_secs, 1500);
}

#[test]
fn test_mode_switch_resets_without_starting() {
    let h = harness();
    let mut engine = TimerEngine::mount(h.app.clone(), None).unwrap();
    engine.start(None).unwrap();
    for _ in 0..4 {
        engine.tick().unwrap();
    }

    let status = engine.switch_mode(TimerMode::LongBreak).unwrap();
    assert_eq!(status.mode, TimerMode::LongBreak);
    assert_eq!(status.remaining_secs, 900);
    assert!(!status.active);
    assert!(!engine.tick().unwrap().is_some());
    assert!(!h.app.store.snapshot().unwrap().state.is_active());
}

#[test]
fn test_engine_stop_clears_everything() {
    let h = harness();
    let mut engine = TimerEngine::mount(h.app.clone(), None).unwrap();
    engine.start(None).unwrap();
    engine.pause().unwrap();

    let status = engine.stop().unwrap();
    assert!(!status.active);
    assert_eq!(status.remaining_secs, 1500);
    for key in TIMER_KEYS {
        assert_eq!(h.storage.get(key).unwrap(), None);
    }
}

#[tokio::test]
async fn test_navigate_away_and_back_continues_countdown() {
    let h = harness();
    h.app.auth.sign_in("ada");

    navigate(&h.app, TIMER_PATH, None);
    assert!(h.app.is_engine_mounted());
    let started = h.app.engine_request(EngineAction::Start { task_id: None }).await.unwrap();
    assert_eq!(started.remaining_secs, 1500);

    navigate(&h.app, "/kanban", None);
    assert!(!h.app.is_engine_mounted());
    h.clock.advance_secs(3);

    let widget = StatusWidget::new(h.app.clone());
    assert_eq!(widget.view().unwrap().remaining_secs, Some(1497));

    let route = widget.open_timer().unwrap();
    assert_eq!(route, Route::Timer);
    assert!(h.app.is_engine_mounted());
    assert!(!widget.view().unwrap().visible);

    let status = h.app.engine_request(EngineAction::Status).await.unwrap();
    assert_eq!(status.remaining_secs, 1497);
    assert!(status.ticking);

    // The preserve flag is single-use
    assert!(h.app.store.snapshot().unwrap().handoff.is_none());
    assert_eq!(h.storage.get(KEY_PRESERVE_ON_MOUNT).unwrap(), None);
}

#[tokio::test]
async fn test_navigation_parameters_restore_lost_state() {
    let h = harness();
    let navigation = pomodoro_sync::shell::NavigationState {
        preserve_timer_state: true,
        remaining_secs: Some(1200),
        paused: true,
    };

    navigate(&h.app, TIMER_PATH, Some(navigation));
    let status = h.app.engine_request(EngineAction::Status).await.unwrap();
    assert_eq!(status.remaining_secs, 1200);
    assert!(status.active);
    assert!(!status.ticking);
    assert_eq!(h.app.store.snapshot().unwrap().state, TimerState::paused(TimerMode::Focus, 1200));
}

#[test]
fn test_mount_without_preserve_on_idle_store_resets() {
    let h = harness();
    let engine = TimerEngine::mount(h.app.clone(), None).unwrap();
    let status = engine.status();
    assert_eq!(status.remaining_secs, 1500);
    assert!(!status.active);
}

#[test]
fn test_rapid_double_toggle_ends_running() {
    let h = harness();
    let widget = StatusWidget::new(h.app.clone());
    h.app.auth.sign_in("ada");
    h.app.router.navigate("/tasks", None);
    h.app.store.start(TimerMode::Focus, 1500).unwrap();

    let paused = widget.toggle().unwrap();
    assert!(paused.paused);
    h.clock.advance_ms(5);
    let resumed = widget.toggle().unwrap();
    assert!(!resumed.paused);

    let snapshot = h.app.store.snapshot().unwrap();
    assert!(snapshot.state.is_running());
    assert_eq!(h.storage.get(KEY_TIMER_PAUSED).unwrap().as_deref(), Some("false"));
}

#[tokio::test]
async fn test_rapid_engine_pause_resume_ends_running() {
    let h = harness();
    navigate(&h.app, TIMER_PATH, None);
    h.app.engine_request(EngineAction::Start { task_id: None }).await.unwrap();

    let (paused, resumed) = tokio::join!(
        h.app.engine_request(EngineAction::Pause),
        h.app.engine_request(EngineAction::Resume),
    );
    assert!(paused.is_ok());
    let resumed = resumed.unwrap();
    assert!(resumed.ticking);
    assert!(!h.app.store.snapshot().unwrap().state.is_paused());
}

#[tokio::test]
async fn test_sign_out_clears_timer_state() {
    let h = harness();
    tokio::spawn(run_status_widget(h.app.clone()));

    h.app.auth.sign_in("ada");
    h.app.router.navigate("/dashboard", None);
    h.app.store.start(TimerMode::Focus, 1500).unwrap();
    h.app.store.mark_handoff().unwrap();

    let mut views = h.app.widget_view_tx.subscribe();
    tokio::time::timeout(Duration::from_secs(2), views.wait_for(|view| view.visible))
        .await
        .expect("widget never became visible")
        .unwrap();

    h.app.auth.sign_out();

    let mut store_rx = h.app.store.subscribe();
    tokio::time::timeout(Duration::from_secs(2), store_rx.wait_for(|s| !s.state.is_active()))
        .await
        .expect("timer state never cleared")
        .unwrap();
    tokio::time::timeout(Duration::from_secs(2), views.wait_for(|view| !view.visible))
        .await
        .expect("widget never hid")
        .unwrap();

    for key in TIMER_KEYS {
        assert_eq!(h.storage.get(key).unwrap(), None, "{key} should be cleared");
    }
    assert_eq!(h.storage.get(KEY_PRESERVE_ON_MOUNT).unwrap(), None);
}

#[tokio::test]
async fn test_sign_out_then_sign_in_clears_previous_timer() {
    let h = harness();
    tokio::spawn(run_status_widget(h.app.clone()));

    h.app.auth.sign_in("ada");
    h.app.router.navigate("/dashboard", None);
    h.app.store.start(TimerMode::Focus, 1500).unwrap();

    // No yield in between: the widget only ever sees bob signed in
    h.app.auth.sign_out();
    h.app.auth.sign_in("bob");

    let mut store_rx = h.app.store.subscribe();
    tokio::time::timeout(Duration::from_secs(2), store_rx.wait_for(|s| !s.state.is_active()))
        .await
        .expect("previous user's timer was kept")
        .unwrap();
    assert_eq!(h.app.auth.current_user().map(|user| user.id).as_deref(), Some("bob"));
    assert_eq!(h.storage.get(KEY_TIMER_END_AT).unwrap(), None);
}

#[test]
fn test_user_switch_clears_timer_once() {
    let h = harness();
    let widget = StatusWidget::new(h.app.clone());

    h.app.auth.sign_in("ada");
    h.app.store.start(TimerMode::Focus, 1500).unwrap();
    assert!(!widget.sync_sign_outs().unwrap());

    h.app.auth.sign_in("bob");
    assert!(widget.sync_sign_outs().unwrap());
    assert!(!h.app.store.snapshot().unwrap().state.is_active());

    // Bob's own timer is left alone afterwards
    h.app.store.start(TimerMode::ShortBreak, 300).unwrap();
    assert!(!widget.sync_sign_outs().unwrap());
    assert!(h.app.store.snapshot().unwrap().state.is_running());
}

#[tokio::test]
async fn test_widget_picks_up_external_storage_writes() {
    let h = harness();
    tokio::spawn(run_status_widget(h.app.clone()));
    h.app.auth.sign_in("ada");
    h.app.router.navigate("/dashboard", None);

    // Another process starts a paused timer in the shared storage
    h.storage.set("timerMode", "longBreak").unwrap();
    h.storage.set("timerRemaining", "600").unwrap();
    h.storage.set("timerPaused", "true").unwrap();
    h.storage.set("timerActive", "true").unwrap();

    let mut views = h.app.widget_view_tx.subscribe();
    let view = tokio::time::timeout(Duration::from_secs(3), views.wait_for(|view| view.visible))
        .await
        .expect("widget never saw the external timer")
        .unwrap()
        .clone();
    assert_eq!(view.mode, Some(TimerMode::LongBreak));
    assert_eq!(view.remaining_secs, Some(600));
    assert!(view.paused);
}
