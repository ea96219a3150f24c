//! Scripted collaborators for driving the orchestrator without processes.
//!
//! Every scripted step fires at an absolute deadline, so `next_event` can be
//! dropped and re-polled without losing or repeating events.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::core::SessionId;
use crate::encoder::{Encoder, EncoderEvent, ExitOutcome, LaunchSpec, Launcher};
use crate::error::{LaunchError, SourceError};
use crate::quality::Quality;
use crate::source::SourceResolver;

/// Behavior of one scripted encoder.
#[derive(Clone, Debug)]
pub(crate) enum Script {
    /// Connects at once, runs out of input after `after`.
    Exhaust { after: Duration },
    /// Emits `line` as a fatal diagnostic after `after` without connecting.
    Fatal { after: Duration, line: &'static str },
    /// Connects at once and streams until terminated.
    Live,
    /// Never reports anything; only the start grace confirms it.
    Silent,
    /// `launch` itself fails.
    FailLaunch,
}

#[derive(Default)]
struct Live {
    current: HashMap<SessionId, usize>,
    peak: HashMap<SessionId, usize>,
    suspended: HashSet<SessionId>,
}

/// One recorded launch.
#[derive(Clone, Debug)]
pub(crate) struct Launched {
    pub session: SessionId,
    pub input: String,
    pub quality: Quality,
}

pub(crate) struct ScriptedLauncher {
    default: Script,
    by_input: Mutex<HashMap<String, Script>>,
    launches: Mutex<Vec<Launched>>,
    live: Arc<Mutex<Live>>,
}

impl ScriptedLauncher {
    pub fn new(default: Script) -> Self {
        Self {
            default,
            by_input: Mutex::new(HashMap::new()),
            launches: Mutex::new(Vec::new()),
            live: Arc::new(Mutex::new(Live::default())),
        }
    }

    /// Overrides the script for one input.
    pub fn script(self, input: &str, script: Script) -> Self {
        self.by_input.lock().insert(input.to_string(), script);
        self
    }

    pub fn launches(&self) -> Vec<Launched> {
        self.launches.lock().clone()
    }

    pub fn inputs(&self, session: SessionId) -> Vec<String> {
        self.launches
            .lock()
            .iter()
            .filter(|l| l.session == session)
            .map(|l| l.input.clone())
            .collect()
    }

    pub fn live(&self, session: SessionId) -> usize {
        self.live.lock().current.get(&session).copied().unwrap_or(0)
    }

    /// Whether the encoder of `session` is currently suspended.
    pub fn suspended(&self, session: SessionId) -> bool {
        self.live.lock().suspended.contains(&session)
    }

    /// Highest number of simultaneously live encoders ever seen for `session`.
    pub fn peak(&self, session: SessionId) -> usize {
        self.live.lock().peak.get(&session).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Launcher for ScriptedLauncher {
    async fn launch(&self, spec: &LaunchSpec) -> Result<Box<dyn Encoder>, LaunchError> {
        let script = self
            .by_input
            .lock()
            .get(&spec.input)
            .cloned()
            .unwrap_or_else(|| self.default.clone());
        self.launches.lock().push(Launched {
            session: spec.session,
            input: spec.input.clone(),
            quality: spec.quality,
        });

        let now = Instant::now();
        let steps: VecDeque<(Instant, EncoderEvent)> = match script {
            Script::FailLaunch => {
                return Err(LaunchError::MissingExecutable {
                    program: "scripted".into(),
                })
            }
            Script::Exhaust { after } => VecDeque::from([
                (now, EncoderEvent::Connected),
                (now + after, EncoderEvent::Exhausted),
                (now + after, EncoderEvent::Exited(ExitOutcome::Exhausted)),
            ]),
            Script::Fatal { after, line } => VecDeque::from([
                (now + after, EncoderEvent::Fatal(line.to_string())),
                (
                    now + after,
                    EncoderEvent::Exited(ExitOutcome::Crashed {
                        reason: line.to_string(),
                    }),
                ),
            ]),
            Script::Live => VecDeque::from([(now, EncoderEvent::Connected)]),
            Script::Silent => VecDeque::new(),
        };

        {
            let mut live = self.live.lock();
            let current = live.current.entry(spec.session).or_default();
            *current += 1;
            let n = *current;
            let peak = live.peak.entry(spec.session).or_default();
            *peak = (*peak).max(n);
        }

        Ok(Box::new(ScriptedEncoder {
            session: spec.session,
            steps,
            live: Arc::clone(&self.live),
            reaped: false,
            suspended: false,
        }))
    }
}

struct ScriptedEncoder {
    session: SessionId,
    steps: VecDeque<(Instant, EncoderEvent)>,
    live: Arc<Mutex<Live>>,
    reaped: bool,
    suspended: bool,
}

impl ScriptedEncoder {
    fn set_suspended(&mut self, on: bool) -> Result<(), LaunchError> {
        if self.reaped {
            return Err(LaunchError::Signal {
                signal: if on { "SIGSTOP" } else { "SIGCONT" },
                reason: "process already exited".into(),
            });
        }
        self.suspended = on;
        let mut live = self.live.lock();
        if on {
            live.suspended.insert(self.session);
        } else {
            live.suspended.remove(&self.session);
        }
        Ok(())
    }

    fn reap(&mut self) {
        if self.reaped {
            return;
        }
        self.reaped = true;
        self.suspended = false;
        self.steps.clear();
        let mut live = self.live.lock();
        live.suspended.remove(&self.session);
        if let Some(n) = live.current.get_mut(&self.session) {
            *n = n.saturating_sub(1);
        }
    }
}

#[async_trait]
impl Encoder for ScriptedEncoder {
    fn pid(&self) -> Option<u32> {
        None
    }

    async fn next_event(&mut self) -> Option<EncoderEvent> {
        if self.reaped {
            return None;
        }
        if self.suspended {
            // A stopped process reports nothing.
            std::future::pending::<()>().await;
        }
        let Some(&(at, _)) = self.steps.front() else {
            std::future::pending::<()>().await;
            return None;
        };
        tokio::time::sleep_until(at).await;
        let (_, ev) = self.steps.pop_front()?;
        if matches!(ev, EncoderEvent::Exited(_)) {
            self.reap();
        }
        Some(ev)
    }

    fn pause(&mut self) -> Result<(), LaunchError> {
        self.set_suspended(true)
    }

    fn resume(&mut self) -> Result<(), LaunchError> {
        self.set_suspended(false)
    }

    async fn terminate(&mut self, _graceful: bool, _timeout: Duration) {
        self.reap();
    }
}

impl Drop for ScriptedEncoder {
    fn drop(&mut self) {
        self.reap();
    }
}

/// Resolves every reference to itself except the ones marked missing.
#[derive(Default)]
pub(crate) struct ScriptedResolver {
    missing: HashSet<String>,
}

impl ScriptedResolver {
    pub fn missing(mut self, reference: &str) -> Self {
        self.missing.insert(reference.to_string());
        self
    }
}

#[async_trait]
impl SourceResolver for ScriptedResolver {
    async fn resolve(&self, reference: &str) -> Result<String, SourceError> {
        if self.missing.contains(reference) {
            return Err(SourceError::new(reference, "No such file or directory"));
        }
        Ok(reference.to_string())
    }
}
