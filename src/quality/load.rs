//! System load samplers.
//!
//! A [`LoadSource`] reports a normalized load in `0.0..=1.0`, or `None` when no
//! reading is available. Absent readings count as low load.

use std::path::PathBuf;

/// Normalized system load reading.
pub trait LoadSource: Send + Sync + 'static {
    /// Current load in `0.0..=1.0`, `None` if unknown.
    fn sample(&self) -> Option<f64>;
}

/// Never reports a reading.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoLoad;

impl LoadSource for NoLoad {
    fn sample(&self) -> Option<f64> {
        None
    }
}

/// Reports a constant value. Handy for pinning behavior in tests and demos.
#[derive(Clone, Copy, Debug)]
pub struct FixedLoad(pub f64);

impl LoadSource for FixedLoad {
    fn sample(&self) -> Option<f64> {
        Some(self.0.clamp(0.0, 1.0))
    }
}

/// One-minute load average divided by the CPU count.
///
/// Reads `/proc/loadavg`; on systems without it every sample is `None`.
#[derive(Clone, Debug)]
pub struct LoadAverage {
    path: PathBuf,
    cpus: usize,
}

impl Default for LoadAverage {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/proc/loadavg"),
            cpus: num_cpus::get(),
        }
    }
}

impl LoadAverage {
    /// Sampler reading `path` instead of `/proc/loadavg`.
    pub fn with_path(path: impl Into<PathBuf>, cpus: usize) -> Self {
        Self {
            path: path.into(),
            cpus: cpus.max(1),
        }
    }
}

impl LoadSource for LoadAverage {
    fn sample(&self) -> Option<f64> {
        let raw = std::fs::read_to_string(&self.path).ok()?;
        let one_min: f64 = raw.split_whitespace().next()?.parse().ok()?;
        Some((one_min / self.cpus.max(1) as f64).clamp(0.0, 1.0))
    }
}
