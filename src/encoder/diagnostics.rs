//! Encoder output classification.
//!
//! Raw text never leaves this module: lines are mapped to a [`Signal`] and the
//! process exit is mapped to an [`ExitOutcome`]. Anything not recognized is kept
//! only as context for failure reasons and is never read as success.

use std::collections::VecDeque;
use std::process::ExitStatus;

use parking_lot::Mutex;

use crate::encoder::target::mask;

/// Lowercased substrings that mark an unrecoverable encoder error.
const FATAL_PATTERNS: &[&str] = &[
    "connection refused",
    "connection reset",
    "connection timed out",
    "broken pipe",
    "input/output error",
    "invalid data found",
    "no such file or directory",
    "server returned",
    "conversion failed",
    "error opening",
    "could not write header",
    "failed to resolve hostname",
    "unknown encoder",
    "permission denied",
];

/// Meaning of one diagnostic line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Signal {
    /// The output was opened: the push connection is established.
    Connected,
    /// The input reached its end.
    Exhausted,
    /// Unrecoverable error; carries the (redacted) line.
    Fatal(String),
    /// Not meaningful on its own.
    Other,
}

/// How an encoder process ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExitOutcome {
    /// Clean exit after the input ran out.
    Exhausted,
    /// Anything else.
    Crashed {
        /// Human-readable failure reason.
        reason: String,
    },
}

/// Classifies a line from the encoder's stderr.
pub fn classify_stderr(line: &str) -> Signal {
    let trimmed = line.trim();
    if trimmed.starts_with("Output #0") {
        return Signal::Connected;
    }
    let lower = trimmed.to_ascii_lowercase();
    if FATAL_PATTERNS.iter().any(|p| lower.contains(p)) {
        return Signal::Fatal(trimmed.to_string());
    }
    Signal::Other
}

/// Classifies a `key=value` line from the `-progress` stream on stdout.
pub fn classify_progress(line: &str) -> Signal {
    match line.trim() {
        "progress=continue" => Signal::Connected,
        "progress=end" => Signal::Exhausted,
        _ => Signal::Other,
    }
}

/// Maps the final process status to an outcome. Fails closed: only a zero exit
/// after the input was reported exhausted counts as [`ExitOutcome::Exhausted`].
pub fn classify_exit(
    status: Option<ExitStatus>,
    saw_end: bool,
    saw_connected: bool,
    tail: &DiagnosticTail,
) -> ExitOutcome {
    let code = match status {
        Some(s) if s.success() && saw_end => return ExitOutcome::Exhausted,
        Some(s) => describe_status(&s),
        None => "exit status unavailable".to_string(),
    };

    let reason = if let Some(fatal) = tail.last_fatal() {
        fatal
    } else if status.is_some_and(|s| s.success()) {
        if saw_connected {
            "encoder exited before the input was exhausted".to_string()
        } else {
            "encoder exited without establishing a connection".to_string()
        }
    } else {
        match tail.last_line() {
            Some(line) => format!("encoder {code}: {line}"),
            None => format!("encoder {code}"),
        }
    };
    ExitOutcome::Crashed { reason }
}

fn describe_status(status: &ExitStatus) -> String {
    if let Some(code) = status.code() {
        return format!("exited with code {code}");
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(sig) = status.signal() {
            return format!("killed by signal {sig}");
        }
    }
    "exited abnormally".to_string()
}

/// Bounded record of recent diagnostic lines with the stream key masked.
#[derive(Debug)]
pub struct DiagnosticTail {
    secret: Option<String>,
    cap: usize,
    inner: Mutex<TailInner>,
}

#[derive(Debug, Default)]
struct TailInner {
    lines: VecDeque<String>,
    last_fatal: Option<String>,
}

impl DiagnosticTail {
    /// Keeps up to `cap` lines; occurrences of `secret` are masked.
    pub fn new(cap: usize, secret: Option<String>) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()),
            cap: cap.max(1),
            inner: Mutex::new(TailInner::default()),
        }
    }

    /// Masks the secret in `line`.
    pub fn redact(&self, line: &str) -> String {
        match &self.secret {
            Some(secret) if line.contains(secret.as_str()) => line.replace(secret.as_str(), &mask(secret)),
            _ => line.to_string(),
        }
    }

    /// Records a line (already redacted) and whether it was fatal.
    pub fn push(&self, line: String, fatal: bool) {
        let mut inner = self.inner.lock();
        if fatal {
            inner.last_fatal = Some(line.clone());
        }
        if inner.lines.len() == self.cap {
            inner.lines.pop_front();
        }
        inner.lines.push_back(line);
    }

    /// Most recent non-empty line.
    pub fn last_line(&self) -> Option<String> {
        self.inner.lock().lines.back().cloned()
    }

    /// Most recent fatal line.
    pub fn last_fatal(&self) -> Option<String> {
        self.inner.lock().last_fatal.clone()
    }

    /// Snapshot of the retained lines, oldest first.
    pub fn lines(&self) -> Vec<String> {
        self.inner.lock().lines.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stderr_patterns() {
        assert_eq!(
            classify_stderr("Output #0, flv, to 'rtmp://x/app/****abcd':"),
            Signal::Connected
        );
        assert!(matches!(
            classify_stderr("[tcp @ 0x55] Connection to tcp://x:1935 failed: Connection refused"),
            Signal::Fatal(_)
        ));
        assert!(matches!(
            classify_stderr("/media/missing.mp4: No such file or directory"),
            Signal::Fatal(_)
        ));
        assert_eq!(classify_stderr("  Stream #0:0: Video: h264"), Signal::Other);
        assert_eq!(classify_stderr("frame=  100 fps= 30"), Signal::Other);
    }

    #[test]
    fn progress_lines() {
        assert_eq!(classify_progress("progress=continue"), Signal::Connected);
        assert_eq!(classify_progress("progress=end\n"), Signal::Exhausted);
        assert_eq!(classify_progress("out_time_ms=1000"), Signal::Other);
    }

    #[test]
    fn tail_is_bounded_and_redacts() {
        let tail = DiagnosticTail::new(2, Some("topsecret99".into()));
        let line = tail.redact("Output #0, flv, to 'rtmp://x/app/topsecret99'");
        assert!(!line.contains("topsecret"));
        assert!(line.ends_with("*******et99'"));

        tail.push("a".into(), false);
        tail.push("b".into(), true);
        tail.push("c".into(), false);
        assert_eq!(tail.lines(), vec!["b".to_string(), "c".to_string()]);
        assert_eq!(tail.last_fatal().as_deref(), Some("b"));
        assert_eq!(tail.last_line().as_deref(), Some("c"));
    }

    #[cfg(unix)]
    #[test]
    fn exit_fails_closed() {
        use std::os::unix::process::ExitStatusExt;
        let ok = ExitStatus::from_raw(0);
        let failed = ExitStatus::from_raw(1 << 8);
        let tail = DiagnosticTail::new(8, None);

        assert_eq!(classify_exit(Some(ok), true, true, &tail), ExitOutcome::Exhausted);
        assert!(matches!(
            classify_exit(Some(ok), false, false, &tail),
            ExitOutcome::Crashed { reason } if reason.contains("without establishing")
        ));

        tail.push("Conversion failed!".into(), true);
        assert_eq!(
            classify_exit(Some(failed), false, true, &tail),
            ExitOutcome::Crashed {
                reason: "Conversion failed!".into()
            }
        );
        assert!(matches!(classify_exit(None, true, true, &tail), ExitOutcome::Crashed { .. }));
    }
}
