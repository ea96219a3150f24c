//! # Encoder process supervision.
//!
//! [`FfmpegLauncher`] spawns one encoder process and returns an [`FfmpegEncoder`]
//! handle. Three background tasks serve each process:
//!
//! ```text
//!   stdout ──► progress drain ─┐               ┌─► EncoderEvent::{Connected, Exhausted, Fatal}
//!   stderr ──► stderr drain  ──┼──► events ────┤
//!   Child  ──► watcher ────────┘               └─► EncoderEvent::Exited(outcome)   (always last)
//!                 ▲
//!                 └── kill token (terminate escalation / handle drop)
//! ```
//!
//! The watcher owns the `Child`, so exactly one task ever waits on it. The handle
//! observes exit through a `watch` flag, which makes [`Encoder::terminate`] idempotent.

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::core::SessionId;
use crate::encoder::diagnostics::{self, DiagnosticTail, ExitOutcome, Signal};
use crate::encoder::{args, RtmpTarget};
use crate::error::LaunchError;
use crate::quality::Quality;

/// Upper bound on draining buffered output after the process has exited.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Lines kept for failure reasons.
const TAIL_LINES: usize = 32;

/// Consecutive read errors after which a drain gives up on its pipe.
const MAX_READ_FAILURES: u32 = 8;

/// Everything needed to launch one encoder.
#[derive(Clone, Debug)]
pub struct LaunchSpec {
    /// Session the process belongs to.
    pub session: SessionId,
    /// Resolved, ready-to-read input.
    pub input: String,
    /// Push destination.
    pub target: RtmpTarget,
    /// Effective quality.
    pub quality: Quality,
    /// Read input at native rate.
    pub realtime: bool,
}

/// Typed observation of a running encoder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EncoderEvent {
    /// Output connection established. Sent at most once.
    Connected,
    /// The input ran out; an `Exited` follows.
    Exhausted,
    /// Unrecoverable error line.
    Fatal(String),
    /// Process ended. Always the final event.
    Exited(ExitOutcome),
}

/// Handle to one live encoder process.
#[async_trait]
pub trait Encoder: Send {
    /// OS process id, if known.
    fn pid(&self) -> Option<u32>;

    /// Next observation; `None` once the process is gone and all events were read.
    ///
    /// Cancel-safe.
    async fn next_event(&mut self) -> Option<EncoderEvent>;

    /// Suspends the process without tearing it down.
    fn pause(&mut self) -> Result<(), LaunchError>;

    /// Continues a suspended process.
    fn resume(&mut self) -> Result<(), LaunchError>;

    /// Stops the process. Graceful stops escalate to a kill after `timeout`.
    ///
    /// Returns once the process has been reaped. Calling it on an exited
    /// process is a no-op.
    async fn terminate(&mut self, graceful: bool, timeout: Duration);
}

/// Spawns encoder processes.
#[async_trait]
pub trait Launcher: Send + Sync + 'static {
    /// Starts an encoder for `spec`.
    async fn launch(&self, spec: &LaunchSpec) -> Result<Box<dyn Encoder>, LaunchError>;
}

/// Launches the ffmpeg binary.
#[derive(Clone, Debug)]
pub struct FfmpegLauncher {
    program: String,
}

impl FfmpegLauncher {
    /// Launcher using `program` as the encoder binary.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl Launcher for FfmpegLauncher {
    async fn launch(&self, spec: &LaunchSpec) -> Result<Box<dyn Encoder>, LaunchError> {
        let argv = args::build(spec)?;
        tracing::debug!(
            session = %spec.session.short(),
            cmd = %args::redacted(&self.program, &argv, spec),
            "spawning encoder"
        );

        let mut child = Command::new(&self.program)
            .args(&argv)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => LaunchError::MissingExecutable {
                    program: self.program.clone(),
                },
                _ => LaunchError::Spawn(e),
            })?;

        let pid = child.id();
        let tail = Arc::new(DiagnosticTail::new(
            TAIL_LINES,
            Some(spec.target.key.expose().to_string()),
        ));
        let flags = Arc::new(Flags::default());
        let (tx, rx) = mpsc::unbounded_channel();
        let (done_tx, done_rx) = watch::channel(false);
        let kill = CancellationToken::new();

        let mut drains = Vec::with_capacity(2);
        if let Some(out) = child.stdout.take() {
            drains.push(tokio::spawn(drain(
                out,
                Stream::Progress,
                tx.clone(),
                tail.clone(),
                flags.clone(),
            )));
        }
        if let Some(err) = child.stderr.take() {
            drains.push(tokio::spawn(drain(
                err,
                Stream::Stderr,
                tx.clone(),
                tail.clone(),
                flags.clone(),
            )));
        }

        let session = spec.session;
        let watcher_kill = kill.clone();
        tokio::spawn(async move {
            let status = tokio::select! {
                st = child.wait() => st,
                _ = watcher_kill.cancelled() => {
                    let _ = child.start_kill();
                    child.wait().await
                }
            };
            let _ = done_tx.send(true);

            let _ = tokio::time::timeout(DRAIN_GRACE, futures::future::join_all(drains)).await;
            let outcome = diagnostics::classify_exit(
                status.as_ref().ok().copied(),
                flags.exhausted.load(Ordering::Acquire),
                flags.connected.load(Ordering::Acquire),
                &tail,
            );
            match &outcome {
                ExitOutcome::Crashed { reason } => tracing::debug!(
                    session = %session.short(),
                    %reason,
                    tail = ?tail.lines(),
                    "encoder crashed"
                ),
                ExitOutcome::Exhausted => tracing::debug!(session = %session.short(), "encoder finished input"),
            }
            let _ = tx.send(EncoderEvent::Exited(outcome));
        });

        Ok(Box::new(FfmpegEncoder {
            pid,
            events: rx,
            done: done_rx,
            kill,
            paused: false,
        }))
    }
}

#[derive(Default)]
struct Flags {
    connected: AtomicBool,
    exhausted: AtomicBool,
}

#[derive(Clone, Copy)]
enum Stream {
    Progress,
    Stderr,
}

async fn drain<R>(
    reader: R,
    stream: Stream,
    tx: mpsc::UnboundedSender<EncoderEvent>,
    tail: Arc<DiagnosticTail>,
    flags: Arc<Flags>,
) where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::with_capacity(256);
    let mut failures = 0;
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => failures = 0,
            Err(e) => {
                failures += 1;
                tracing::debug!(error = %e, failures, "encoder output read failed");
                if failures >= MAX_READ_FAILURES {
                    break;
                }
                continue;
            }
        }
        let raw = String::from_utf8_lossy(&buf);
        let raw = raw.trim_end_matches(['\n', '\r']);
        let signal = match stream {
            Stream::Progress => diagnostics::classify_progress(raw),
            Stream::Stderr => {
                let line = tail.redact(raw.trim());
                if line.is_empty() {
                    continue;
                }
                let signal = diagnostics::classify_stderr(&line);
                tail.push(line, matches!(signal, Signal::Fatal(_)));
                signal
            }
        };

        let event = match signal {
            Signal::Connected => {
                if flags.connected.swap(true, Ordering::AcqRel) {
                    continue;
                }
                EncoderEvent::Connected
            }
            Signal::Exhausted => {
                if flags.exhausted.swap(true, Ordering::AcqRel) {
                    continue;
                }
                EncoderEvent::Exhausted
            }
            Signal::Fatal(line) => EncoderEvent::Fatal(line),
            Signal::Other => continue,
        };
        // Keep reading after the handle is gone; a closed pipe would SIGPIPE the encoder.
        let _ = tx.send(event);
    }
}

/// Handle returned by [`FfmpegLauncher`].
pub struct FfmpegEncoder {
    pid: Option<u32>,
    events: mpsc::UnboundedReceiver<EncoderEvent>,
    done: watch::Receiver<bool>,
    kill: CancellationToken,
    paused: bool,
}

impl FfmpegEncoder {
    fn exited(&self) -> bool {
        *self.done.borrow()
    }

    async fn wait_exit(&mut self) {
        let _ = self.done.wait_for(|d| *d).await;
    }

    /// SIGCONT (if paused) then SIGTERM; true if the process exited within `timeout`.
    #[cfg(unix)]
    async fn stop_cooperatively(&mut self, timeout: Duration) -> bool {
        use nix::sys::signal::Signal;

        if self.paused {
            let _ = self.signal(Signal::SIGCONT);
            self.paused = false;
        }
        if self.signal(Signal::SIGTERM).is_err() {
            return self.exited();
        }
        if tokio::time::timeout(timeout, self.wait_exit()).await.is_ok() {
            return true;
        }
        tracing::warn!(pid = ?self.pid, ?timeout, "encoder ignored SIGTERM, killing");
        false
    }

    #[cfg(not(unix))]
    async fn stop_cooperatively(&mut self, _timeout: Duration) -> bool {
        false
    }

    #[cfg(unix)]
    fn signal(&self, sig: nix::sys::signal::Signal) -> Result<(), LaunchError> {
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        let pid = self.pid.ok_or_else(|| LaunchError::Signal {
            signal: sig.as_str(),
            reason: "process id unavailable".into(),
        })?;
        if self.exited() {
            return Err(LaunchError::Signal {
                signal: sig.as_str(),
                reason: "process already exited".into(),
            });
        }
        kill(Pid::from_raw(pid as i32), sig).map_err(|e| LaunchError::Signal {
            signal: sig.as_str(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl Encoder for FfmpegEncoder {
    fn pid(&self) -> Option<u32> {
        self.pid
    }

    async fn next_event(&mut self) -> Option<EncoderEvent> {
        self.events.recv().await
    }

    #[cfg(unix)]
    fn pause(&mut self) -> Result<(), LaunchError> {
        self.signal(nix::sys::signal::Signal::SIGSTOP)?;
        self.paused = true;
        Ok(())
    }

    #[cfg(not(unix))]
    fn pause(&mut self) -> Result<(), LaunchError> {
        Err(LaunchError::Signal {
            signal: "SIGSTOP",
            reason: "process suspension is not supported on this platform".into(),
        })
    }

    #[cfg(unix)]
    fn resume(&mut self) -> Result<(), LaunchError> {
        self.signal(nix::sys::signal::Signal::SIGCONT)?;
        self.paused = false;
        Ok(())
    }

    #[cfg(not(unix))]
    fn resume(&mut self) -> Result<(), LaunchError> {
        Err(LaunchError::Signal {
            signal: "SIGCONT",
            reason: "process suspension is not supported on this platform".into(),
        })
    }

    async fn terminate(&mut self, graceful: bool, timeout: Duration) {
        if self.exited() {
            return;
        }
        if graceful && self.stop_cooperatively(timeout).await {
            return;
        }
        self.kill.cancel();
        self.wait_exit().await;
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        self.kill.cancel();
    }
}
