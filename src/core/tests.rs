use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::config::Config;
use crate::core::{CallerId, Orchestrator, SessionId, SessionSpec, SessionState, SessionStatus};
use crate::encoder::RtmpTarget;
use crate::error::{CapacityScope, OrchestratorError};
use crate::events::{Event, EventKind};
use crate::policies::{BackoffPolicy, JitterPolicy, RestartPolicy};
use crate::quality::{Bitrate, FixedLoad, QualityRequest, Tier};
use crate::store::{MemoryStore, SessionStore};
use crate::subscribers::Subscribe;
use crate::testing::{Script, ScriptedLauncher, ScriptedResolver};

const OWNER: CallerId = CallerId(1);
const OTHER: CallerId = CallerId(2);
const ADMIN: CallerId = CallerId(99);

fn config() -> Config {
    Config {
        rate_limit_calls: 0,
        privileged: vec![ADMIN],
        start_grace: Duration::from_secs(1),
        stop_timeout: Duration::from_secs(1),
        restart: RestartPolicy {
            max_restarts: 2,
            backoff: BackoffPolicy {
                first: Duration::from_millis(100),
                max: Duration::from_secs(1),
                factor: 2.0,
                jitter: JitterPolicy::None,
            },
        },
        ..Config::default()
    }
}

struct Harness {
    orch: Orchestrator,
    launcher: Arc<ScriptedLauncher>,
    store: Arc<MemoryStore>,
}

fn harness(cfg: Config, launcher: ScriptedLauncher, resolver: ScriptedResolver, load: f64) -> Harness {
    let launcher = Arc::new(launcher);
    let store = Arc::new(MemoryStore::new());
    let orch = Orchestrator::builder(cfg)
        .with_launcher(launcher.clone())
        .with_resolver(Arc::new(resolver))
        .with_load(Arc::new(FixedLoad(load)))
        .with_store(store.clone())
        .build();
    Harness { orch, launcher, store }
}

fn simple(script: Script) -> Harness {
    harness(config(), ScriptedLauncher::new(script), ScriptedResolver::default(), 0.1)
}

fn spec(source: &str) -> SessionSpec {
    SessionSpec::new(source, RtmpTarget::new("rtmp://live.example/app", "sk-0123456789"))
}

async fn wait_for(orch: &Orchestrator, id: SessionId, want: SessionState) -> SessionStatus {
    for _ in 0..1000 {
        let st = orch.get(ADMIN, id).await.unwrap();
        if st.state == want {
            return st;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("session {id} never reached {want}");
}

async fn eventually(mut cond: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("condition not met");
}

fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut out = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        out.push(ev);
    }
    out
}

fn kinds(events: &[Event]) -> Vec<EventKind> {
    events.iter().map(|e| e.kind).collect()
}

#[tokio::test(start_paused = true)]
async fn capacity_is_freed_by_stop() {
    let h = harness(
        Config {
            max_sessions: 1,
            ..config()
        },
        ScriptedLauncher::new(Script::Live),
        ScriptedResolver::default(),
        0.1,
    );

    let a = h.orch.create(OWNER, spec("a.mp4")).await.unwrap();
    let err = h.orch.create(OWNER, spec("b.mp4")).await.unwrap_err();
    assert!(matches!(
        err,
        OrchestratorError::CapacityExceeded {
            scope: CapacityScope::Global,
            limit: 1
        }
    ));
    assert_eq!(h.orch.status(OWNER).await.unwrap().len(), 1);
    assert_eq!(h.store.session_count(), 1);

    h.orch.stop(OWNER, a.id).await.unwrap();
    let b = h.orch.create(OWNER, spec("b.mp4")).await.unwrap();
    assert_ne!(a.id, b.id);
    assert_eq!(h.orch.active_sessions().await, 1);
}

#[tokio::test(start_paused = true)]
async fn per_owner_cap_only_binds_that_owner() {
    let h = harness(
        Config {
            max_sessions_per_owner: 1,
            ..config()
        },
        ScriptedLauncher::new(Script::Live),
        ScriptedResolver::default(),
        0.1,
    );

    h.orch.create(OWNER, spec("a.mp4")).await.unwrap();
    let err = h.orch.create(OWNER, spec("b.mp4")).await.unwrap_err();
    assert!(matches!(
        err,
        OrchestratorError::CapacityExceeded {
            scope: CapacityScope::Owner(CallerId(1)),
            ..
        }
    ));
    h.orch.create(OTHER, spec("c.mp4")).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn high_load_steps_down_one_tier() {
    let h = harness(config(), ScriptedLauncher::new(Script::Live), ScriptedResolver::default(), 0.95);
    let mut rx = h.orch.subscribe();

    let s = h
        .orch
        .create(OWNER, spec("a.mp4").with_quality(QualityRequest::tier(Tier::P720)))
        .await
        .unwrap();
    h.orch.start(OWNER, s.id).await.unwrap();
    let st = wait_for(&h.orch, s.id, SessionState::Running).await;

    assert_eq!(h.launcher.launches()[0].quality.tier, Tier::P480);
    assert_eq!(st.quality.map(|q| q.tier), Some(Tier::P480));
    assert_eq!(st.requested.tier, Tier::P720);

    let events = drain(&mut rx);
    let downgrade = events
        .iter()
        .find(|e| e.kind == EventKind::QualityDowngraded)
        .expect("downgrade event");
    assert_eq!(downgrade.reason.as_deref(), Some("720p -> 480p"));

    h.orch.stop(OWNER, s.id).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn pinned_bitrate_ignores_load() {
    let h = harness(config(), ScriptedLauncher::new(Script::Live), ScriptedResolver::default(), 0.95);

    let request = QualityRequest::tier(Tier::P720).with_video(Bitrate::kbps(3000));
    let s = h.orch.create(OWNER, spec("a.mp4").with_quality(request)).await.unwrap();
    h.orch.start(OWNER, s.id).await.unwrap();
    wait_for(&h.orch, s.id, SessionState::Running).await;

    let launched = h.launcher.launches()[0].quality;
    assert_eq!(launched.tier, Tier::P720);
    assert_eq!(launched.video, Bitrate::kbps(3000));
    h.orch.stop(OWNER, s.id).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn looping_playlist_wraps_around() {
    let h = simple(Script::Exhaust {
        after: Duration::from_secs(1),
    });
    h.orch.enqueue(OWNER, "one.mp4").await.unwrap();
    h.orch.enqueue(OWNER, "two.mp4").await.unwrap();

    let s = h
        .orch
        .create_from_playlist(OWNER, RtmpTarget::new("rtmp://live.example/app", "sk-0123456789"), None, true)
        .await
        .unwrap();
    assert_eq!(s.source, "one.mp4");
    h.orch.start(OWNER, s.id).await.unwrap();

    let launcher = h.launcher.clone();
    eventually(|| launcher.inputs(s.id).len() >= 3).await;
    assert_eq!(&launcher.inputs(s.id)[..3], ["one.mp4", "two.mp4", "one.mp4"]);
    assert_eq!(launcher.peak(s.id), 1);

    let st = h.orch.stop(OWNER, s.id).await.unwrap();
    assert_eq!(st.state, SessionState::Stopped);
    assert_eq!(st.restart_count, 0);
    assert_eq!(launcher.live(s.id), 0);
}

#[tokio::test(start_paused = true)]
async fn exhausted_without_queue_stops() {
    let h = simple(Script::Exhaust {
        after: Duration::from_secs(1),
    });
    let s = h.orch.create(OWNER, spec("a.mp4")).await.unwrap();
    h.orch.start(OWNER, s.id).await.unwrap();

    let st = wait_for(&h.orch, s.id, SessionState::Stopped).await;
    assert_eq!(st.last_error, None);
    assert_eq!(h.launcher.inputs(s.id), ["a.mp4"]);
}

#[tokio::test(start_paused = true)]
async fn crash_loop_gives_up_at_restart_cap() {
    let h = simple(Script::Fatal {
        after: Duration::from_millis(10),
        line: "rtmp://live.example/app: Connection refused",
    });
    let mut rx = h.orch.subscribe();

    let s = h.orch.create(OWNER, spec("a.mp4")).await.unwrap();
    h.orch.start(OWNER, s.id).await.unwrap();
    let st = wait_for(&h.orch, s.id, SessionState::Stopped).await;

    assert_eq!(st.restart_count, 2);
    assert!(st.last_error.unwrap().contains("Connection refused"));
    assert_eq!(h.launcher.launches().len(), 3);
    assert_eq!(h.launcher.peak(s.id), 1);

    let seen = kinds(&drain(&mut rx));
    assert_eq!(seen.iter().filter(|k| **k == EventKind::SessionCrashed).count(), 3);
    assert_eq!(seen.iter().filter(|k| **k == EventKind::RestartScheduled).count(), 2);
    assert!(seen.contains(&EventKind::RestartLimitExceeded));
    assert_eq!(seen.last(), Some(&EventKind::SessionStopped));

    let stored = h.store.get_session(s.id).await.unwrap().unwrap();
    assert_eq!(stored.state, SessionState::Stopped);
    assert_eq!(stored.restart_count, 2);
}

#[tokio::test(start_paused = true)]
async fn launch_failures_consume_restarts() {
    let h = simple(Script::FailLaunch);
    let s = h.orch.create(OWNER, spec("a.mp4")).await.unwrap();
    h.orch.start(OWNER, s.id).await.unwrap();

    let st = wait_for(&h.orch, s.id, SessionState::Stopped).await;
    assert_eq!(st.restart_count, 2);
    assert!(st.last_error.unwrap().contains("not found"));
}

#[tokio::test(start_paused = true)]
async fn rate_gate_rejects_sixth_call() {
    let h = harness(
        Config {
            rate_limit_calls: 5,
            rate_limit_period: Duration::from_secs(60),
            ..config()
        },
        ScriptedLauncher::new(Script::Live),
        ScriptedResolver::default(),
        0.1,
    );

    for _ in 0..5 {
        h.orch.status(OWNER).await.unwrap();
    }
    let err = h.orch.status(OWNER).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::RateLimited { caller: CallerId(1), .. }));

    h.orch.status(OTHER).await.unwrap();
    for _ in 0..20 {
        h.orch.status(ADMIN).await.unwrap();
    }
}

#[tokio::test(start_paused = true)]
async fn stop_while_starting_reaps_encoder() {
    let h = harness(
        Config {
            start_grace: Duration::from_secs(30),
            ..config()
        },
        ScriptedLauncher::new(Script::Silent),
        ScriptedResolver::default(),
        0.1,
    );
    let s = h.orch.create(OWNER, spec("a.mp4")).await.unwrap();
    let started = h.orch.start(OWNER, s.id).await.unwrap();
    assert_eq!(started.state, SessionState::Starting);

    let launcher = h.launcher.clone();
    eventually(|| launcher.live(s.id) == 1).await;
    assert_eq!(h.orch.get(OWNER, s.id).await.unwrap().state, SessionState::Starting);

    let st = h.orch.stop(OWNER, s.id).await.unwrap();
    assert_eq!(st.state, SessionState::Stopped);
    assert_eq!(launcher.live(s.id), 0);
}

#[tokio::test(start_paused = true)]
async fn silent_encoder_runs_after_grace() {
    let h = simple(Script::Silent);
    let s = h.orch.create(OWNER, spec("a.mp4")).await.unwrap();
    h.orch.start(OWNER, s.id).await.unwrap();

    let st = wait_for(&h.orch, s.id, SessionState::Running).await;
    assert!(st.uptime.is_some());
    h.orch.stop(OWNER, s.id).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn stop_during_backoff_cancels_restart() {
    let mut cfg = config();
    cfg.restart.backoff.first = Duration::from_secs(30);
    cfg.restart.backoff.max = Duration::from_secs(30);
    let h = harness(
        cfg,
        ScriptedLauncher::new(Script::Fatal {
            after: Duration::from_millis(10),
            line: "Broken pipe",
        }),
        ScriptedResolver::default(),
        0.1,
    );

    let s = h.orch.create(OWNER, spec("a.mp4")).await.unwrap();
    h.orch.start(OWNER, s.id).await.unwrap();
    wait_for(&h.orch, s.id, SessionState::Restarting).await;

    let st = h.orch.stop(OWNER, s.id).await.unwrap();
    assert_eq!(st.state, SessionState::Stopped);
    assert_eq!(st.restart_count, 1);
    assert_eq!(st.last_error.as_deref(), Some("Broken pipe"));

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(h.launcher.launches().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn pause_and_resume() {
    let h = simple(Script::Live);
    let mut rx = h.orch.subscribe();
    let s = h.orch.create(OWNER, spec("a.mp4")).await.unwrap();

    let err = h.orch.pause(OWNER, s.id).await.unwrap_err();
    assert!(matches!(
        err,
        OrchestratorError::InvalidTransition {
            from: SessionState::Pending,
            to: SessionState::Paused,
            ..
        }
    ));

    h.orch.start(OWNER, s.id).await.unwrap();
    wait_for(&h.orch, s.id, SessionState::Running).await;

    let st = h.orch.pause(OWNER, s.id).await.unwrap();
    assert_eq!(st.state, SessionState::Paused);
    assert!(h.orch.pause(OWNER, s.id).await.is_err());
    assert_eq!(h.orch.get(OWNER, s.id).await.unwrap().state, SessionState::Paused);

    let st = h.orch.resume(OWNER, s.id).await.unwrap();
    assert_eq!(st.state, SessionState::Running);

    h.orch.stop(OWNER, s.id).await.unwrap();
    let seen = kinds(&drain(&mut rx));
    assert!(seen.contains(&EventKind::SessionPaused));
    assert!(seen.contains(&EventKind::SessionResumed));
    assert!(seen.contains(&EventKind::SessionStopping));
    assert_eq!(seen.last(), Some(&EventKind::SessionStopped));
    assert_eq!(h.launcher.launches().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn stopping_a_paused_session_reaps_its_encoder() {
    let h = simple(Script::Live);
    let s = h.orch.create(OWNER, spec("a.mp4")).await.unwrap();
    h.orch.start(OWNER, s.id).await.unwrap();
    wait_for(&h.orch, s.id, SessionState::Running).await;

    h.orch.pause(OWNER, s.id).await.unwrap();
    assert!(h.launcher.suspended(s.id));

    let st = h.orch.stop(OWNER, s.id).await.unwrap();
    assert_eq!(st.state, SessionState::Stopped);
    assert_eq!(h.launcher.live(s.id), 0);
    assert!(!h.launcher.suspended(s.id));
}

#[tokio::test(start_paused = true)]
async fn unreachable_item_is_skipped() {
    let h = harness(
        config(),
        ScriptedLauncher::new(Script::Exhaust {
            after: Duration::from_secs(1),
        }),
        ScriptedResolver::default().missing("gone.mp4"),
        0.1,
    );
    let mut rx = h.orch.subscribe();
    h.orch.enqueue(OWNER, "gone.mp4").await.unwrap();
    h.orch.enqueue(OWNER, "two.mp4").await.unwrap();

    let s = h
        .orch
        .create_from_playlist(OWNER, RtmpTarget::new("rtmp://live.example/app", "sk-0123456789"), None, false)
        .await
        .unwrap();
    h.orch.start(OWNER, s.id).await.unwrap();
    let st = wait_for(&h.orch, s.id, SessionState::Stopped).await;

    assert_eq!(h.launcher.inputs(s.id), ["two.mp4"]);
    assert_eq!(st.restart_count, 0);
    assert_eq!(st.source, "two.mp4");

    let events = drain(&mut rx);
    let unavailable = events
        .iter()
        .find(|e| e.kind == EventKind::SourceUnavailable)
        .expect("source unavailable event");
    assert!(unavailable.reason.as_deref().unwrap_or("").contains("gone.mp4"));
    assert!(kinds(&events).contains(&EventKind::SourceAdvanced));
}

#[tokio::test(start_paused = true)]
async fn unreachable_source_with_empty_queue_stops() {
    let h = harness(
        config(),
        ScriptedLauncher::new(Script::Live),
        ScriptedResolver::default().missing("gone.mp4"),
        0.1,
    );
    let s = h.orch.create(OWNER, spec("gone.mp4")).await.unwrap();
    h.orch.start(OWNER, s.id).await.unwrap();

    let st = wait_for(&h.orch, s.id, SessionState::Stopped).await;
    assert!(st.last_error.unwrap().contains("unavailable"));
    assert!(h.launcher.launches().is_empty());
}

#[tokio::test(start_paused = true)]
async fn other_callers_cannot_see_sessions() {
    let h = simple(Script::Live);
    let s = h.orch.create(OWNER, spec("a.mp4")).await.unwrap();

    assert!(matches!(
        h.orch.start(OTHER, s.id).await.unwrap_err(),
        OrchestratorError::NotFound { .. }
    ));
    assert!(h.orch.status(OTHER).await.unwrap().is_empty());
    assert_eq!(h.orch.status(ADMIN).await.unwrap().len(), 1);

    let st = h.orch.stop(ADMIN, s.id).await.unwrap();
    assert_eq!(st.state, SessionState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn start_is_rejected_once_started() {
    let h = simple(Script::Live);
    let s = h.orch.create(OWNER, spec("a.mp4")).await.unwrap();
    h.orch.start(OWNER, s.id).await.unwrap();

    let err = h.orch.start(OWNER, s.id).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::InvalidTransition { .. }));
    wait_for(&h.orch, s.id, SessionState::Running).await;
    assert_eq!(h.launcher.peak(s.id), 1);

    h.orch.stop(OWNER, s.id).await.unwrap();
    let err = h.orch.stop(OWNER, s.id).await.unwrap_err();
    assert!(matches!(
        err,
        OrchestratorError::InvalidTransition {
            from: SessionState::Stopped,
            ..
        }
    ));
}

#[tokio::test(start_paused = true)]
async fn forget_only_drops_stopped_sessions() {
    let h = simple(Script::Live);
    let s = h.orch.create(OWNER, spec("a.mp4")).await.unwrap();

    assert!(h.orch.forget(OWNER, s.id).await.is_err());
    h.orch.stop(OWNER, s.id).await.unwrap();
    h.orch.forget(OWNER, s.id).await.unwrap();

    assert!(matches!(
        h.orch.get(OWNER, s.id).await.unwrap_err(),
        OrchestratorError::NotFound { .. }
    ));
    assert_eq!(h.store.session_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn stop_all_is_scoped_for_regular_callers() {
    let h = simple(Script::Live);
    let mine = h.orch.create(OWNER, spec("a.mp4")).await.unwrap();
    let theirs = h.orch.create(OTHER, spec("b.mp4")).await.unwrap();
    h.orch.start(OWNER, mine.id).await.unwrap();
    h.orch.start(OTHER, theirs.id).await.unwrap();
    wait_for(&h.orch, mine.id, SessionState::Running).await;
    wait_for(&h.orch, theirs.id, SessionState::Running).await;

    let report = h.orch.stop_all(OWNER, None).await.unwrap();
    assert_eq!(report.stopped, vec![mine.id]);
    assert!(report.is_clean());
    assert_eq!(
        h.orch.get(OTHER, theirs.id).await.unwrap().state,
        SessionState::Running
    );

    let report = h.orch.stop_all(ADMIN, None).await.unwrap();
    assert_eq!(report.stopped, vec![theirs.id]);
}

#[tokio::test(start_paused = true)]
async fn playlist_mutations_are_persisted_and_restored() {
    let h = simple(Script::Live);
    h.orch.enqueue(OWNER, "a.mp4").await.unwrap();
    h.orch.enqueue(OWNER, "b.mp4").await.unwrap();
    h.orch.enqueue(OWNER, "c.mp4").await.unwrap();

    let removed = h.orch.remove_from_playlist(OWNER, 1).await.unwrap().unwrap();
    assert_eq!(removed.source, "b.mp4");
    assert!(h.orch.remove_from_playlist(OWNER, 7).await.unwrap().is_none());

    let stored = h.store.get_playlist(OWNER).await.unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[1].position, 1);

    assert_eq!(h.orch.clear_playlist(OWNER).await.unwrap(), 2);
    assert!(h.orch.playlist(OWNER).await.unwrap().is_empty());

    h.store.put_playlist(OWNER, &stored).await.unwrap();
    assert_eq!(h.orch.restore_playlist(OWNER).await.unwrap(), 2);
    let sources: Vec<String> = h
        .orch
        .playlist(OWNER)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.source)
        .collect();
    assert_eq!(sources, ["a.mp4", "c.mp4"]);
}

#[tokio::test(start_paused = true)]
async fn create_from_empty_playlist_fails() {
    let h = simple(Script::Live);
    let err = h
        .orch
        .create_from_playlist(OWNER, RtmpTarget::new("rtmp://x/app", "sk-0123456789"), None, true)
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::SourceUnavailable { .. }));
    assert!(h.orch.status(OWNER).await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn rejected_playlist_create_keeps_the_head() {
    let cfg = Config {
        max_sessions: 1,
        ..config()
    };
    let h = harness(cfg, ScriptedLauncher::new(Script::Live), ScriptedResolver::default(), 0.1);
    h.orch.create(OTHER, spec("busy.mp4")).await.unwrap();
    h.orch.enqueue(OWNER, "a.mp4").await.unwrap();
    h.orch.enqueue(OWNER, "b.mp4").await.unwrap();

    let target = RtmpTarget::new("rtmp://x/app", "sk-0123456789");
    let err = h
        .orch
        .create_from_playlist(OWNER, target.clone(), None, false)
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::CapacityExceeded { .. }));
    assert!(h.orch.playlist(OWNER).await.unwrap().iter().all(|e| !e.consumed));

    h.orch.stop_all(ADMIN, None).await.unwrap();
    let s = h.orch.create_from_playlist(OWNER, target, None, false).await.unwrap();
    assert_eq!(s.source, "a.mp4");
    let entries = h.orch.playlist(OWNER).await.unwrap();
    assert!(entries[0].consumed);
    assert!(!entries[1].consumed);
}

#[tokio::test(start_paused = true)]
async fn calls_after_shutdown_are_refused() {
    let h = simple(Script::Live);
    let s = h.orch.create(OWNER, spec("a.mp4")).await.unwrap();
    h.orch.shutdown().await;

    assert!(matches!(
        h.orch.start(OWNER, s.id).await.unwrap_err(),
        OrchestratorError::ShuttingDown
    ));
    assert!(matches!(
        h.orch.create(OWNER, spec("b.mp4")).await.unwrap_err(),
        OrchestratorError::ShuttingDown
    ));
    assert_eq!(h.launcher.launches().len(), 0);
}

struct Collect(Arc<Mutex<Vec<EventKind>>>);

#[async_trait]
impl Subscribe for Collect {
    async fn on_event(&self, e: &Event) {
        self.0.lock().push(e.kind);
    }

    fn name(&self) -> &'static str {
        "collect"
    }
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_sessions_and_drains_subscribers() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let launcher = Arc::new(ScriptedLauncher::new(Script::Live));
    let orch = Orchestrator::builder(config())
        .with_launcher(launcher.clone())
        .with_resolver(Arc::new(ScriptedResolver::default()))
        .with_load(Arc::new(FixedLoad(0.0)))
        .with_subscriber(Arc::new(Collect(seen.clone())))
        .build();

    let s = orch.create(OWNER, spec("a.mp4")).await.unwrap();
    orch.start(OWNER, s.id).await.unwrap();
    wait_for(&orch, s.id, SessionState::Running).await;

    let report = orch.shutdown().await;
    assert_eq!(report.stopped, vec![s.id]);
    assert_eq!(launcher.live(s.id), 0);

    let seen = seen.lock().clone();
    assert_eq!(seen.first(), Some(&EventKind::SessionCreated));
    assert!(seen.contains(&EventKind::SessionStarted));
    assert_eq!(seen.last(), Some(&EventKind::SessionStopped));
}
