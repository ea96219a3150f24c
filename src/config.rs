//! # Orchestrator configuration.
//!
//! Provides [`Config`], the centralized settings for the orchestrator runtime.
//!
//! Config is used in three places:
//! 1. **Registry**: concurrency caps, start grace, stop timeout, restart policy;
//! 2. **Rate gate**: call budget per period and privileged callers;
//! 3. **Encoder launch**: binary path, quality defaults, load high-water mark.
//!
//! ## Sentinel values
//! - `max_sessions = 0` → no global cap
//! - `max_sessions_per_owner = 0` → no per-owner cap
//! - `rate_limit_calls = 0` → rate gate disabled
//!
//! ## Environment
//! [`Config::from_env`] overlays the defaults with the variables below
//! (unset variables keep their default):
//!
//! | Variable                 | Field                    | Example          |
//! |--------------------------|--------------------------|------------------|
//! | `ADMIN_IDS`              | `privileged`             | `111,222`        |
//! | `FFMPEG_PATH`            | `encoder_path`           | `/usr/bin/ffmpeg`|
//! | `RATE_LIMIT_CALLS`       | `rate_limit_calls`       | `5`              |
//! | `RATE_LIMIT_PERIOD`      | `rate_limit_period` (s)  | `60`             |
//! | `DEFAULT_QUALITY`        | `default_quality`        | `720`            |
//! | `DEFAULT_VIDEO_BITRATE`  | `default_video_bitrate`  | `2500k`          |
//! | `DEFAULT_AUDIO_BITRATE`  | `audio_bitrate`          | `128k`           |
//! | `DEFAULT_FPS`            | `fps`                    | `30`             |
//! | `MAX_SESSIONS`           | `max_sessions`           | `4`              |
//! | `MAX_SESSIONS_PER_OWNER` | `max_sessions_per_owner` | `2`              |
//! | `MAX_RESTARTS`           | `restart.max_restarts`   | `5`              |
//! | `LOAD_HIGH_WATER`        | `load_high_water`        | `0.8`            |

use std::time::Duration;

use serde::Deserialize;

use crate::core::CallerId;
use crate::error::ConfigError;
use crate::policies::{BackoffPolicy, JitterPolicy, RestartPolicy};
use crate::quality::{Bitrate, QualityController, QualityRequest, Tier};

/// Global configuration for the orchestrator.
///
/// ## Notes
/// All fields are public for flexibility. Prefer the helper accessors to avoid
/// sprinkling sentinel checks (`0`) across the codebase.
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum number of live sessions across all owners (`0` = unlimited).
    ///
    /// A session is live from creation until it reaches `STOPPED`.
    pub max_sessions: usize,

    /// Maximum number of live sessions per owner (`0` = unlimited).
    pub max_sessions_per_owner: usize,

    /// Automatic restart cap and the backoff between restarts.
    pub restart: RestartPolicy,

    /// How long a freshly spawned encoder may stay silent before it is
    /// considered running anyway.
    pub start_grace: Duration,

    /// Time allowed for a cooperative stop before the encoder is killed.
    pub stop_timeout: Duration,

    /// Control calls allowed per caller within `rate_limit_period` (`0` = unlimited).
    pub rate_limit_calls: u32,

    /// Window over which `rate_limit_calls` refills completely.
    pub rate_limit_period: Duration,

    /// Callers that bypass the rate gate.
    pub privileged: Vec<CallerId>,

    /// Normalized system load above which new launches step down one tier.
    pub load_high_water: f64,

    /// Encoder binary.
    pub encoder_path: String,

    /// Read inputs at native frame rate (`-re`).
    pub realtime_input: bool,

    /// Tier used when a caller does not ask for one.
    pub default_quality: Tier,

    /// Base video bitrate of `default_quality` (`None` = tier table).
    ///
    /// Load adaptation still applies; only a caller-supplied bitrate pins quality.
    pub default_video_bitrate: Option<Bitrate>,

    /// Audio bitrate for every tier.
    pub audio_bitrate: Bitrate,

    /// Output frame rate.
    pub fps: u32,

    /// Capacity of the event bus ring buffer (min 1).
    pub bus_capacity: usize,
}

impl Config {
    /// Returns the global session cap as an `Option`.
    #[inline]
    pub fn global_limit(&self) -> Option<usize> {
        (self.max_sessions > 0).then_some(self.max_sessions)
    }

    /// Returns the per-owner session cap as an `Option`.
    #[inline]
    pub fn owner_limit(&self) -> Option<usize> {
        (self.max_sessions_per_owner > 0).then_some(self.max_sessions_per_owner)
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Quality request used when the caller supplies none.
    pub fn default_request(&self) -> QualityRequest {
        QualityRequest::tier(self.default_quality)
    }

    /// Quality controller carrying the configured audio, frame rate, load
    /// threshold and default-tier bitrate.
    pub fn quality_controller(&self) -> QualityController {
        let ctl = QualityController::new(self.load_high_water, self.audio_bitrate, self.fps);
        match self.default_video_bitrate {
            Some(rate) => ctl.with_base_bitrate(self.default_quality, rate),
            None => ctl,
        }
    }

    /// Loads the defaults overlaid with process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars())
    }

    /// Loads the defaults overlaid with the given `(NAME, value)` pairs.
    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let env: EnvOverrides = envy::from_iter(vars)?;
        let mut cfg = Config::default();
        env.apply(&mut cfg)?;
        Ok(cfg)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - no concurrency caps
    /// - `restart`: 5 restarts, backoff 5s doubling up to 60s, no jitter
    /// - `start_grace = 10s`, `stop_timeout = 5s`
    /// - 5 calls per 60s per caller, nobody privileged
    /// - `load_high_water = 0.8`
    /// - `ffmpeg`, realtime input, 720p at 30fps, audio 128k
    fn default() -> Self {
        Self {
            max_sessions: 0,
            max_sessions_per_owner: 0,
            restart: RestartPolicy {
                max_restarts: 5,
                backoff: BackoffPolicy {
                    first: Duration::from_secs(5),
                    max: Duration::from_secs(60),
                    factor: 2.0,
                    jitter: JitterPolicy::None,
                },
            },
            start_grace: Duration::from_secs(10),
            stop_timeout: Duration::from_secs(5),
            rate_limit_calls: 5,
            rate_limit_period: Duration::from_secs(60),
            privileged: Vec::new(),
            load_high_water: 0.8,
            encoder_path: "ffmpeg".to_string(),
            realtime_input: true,
            default_quality: Tier::P720,
            default_video_bitrate: None,
            audio_bitrate: Bitrate::kbps(128),
            fps: 30,
            bus_capacity: 1024,
        }
    }
}

/// Raw environment view; every field is optional.
#[derive(Debug, Default, Deserialize)]
struct EnvOverrides {
    admin_ids: Option<String>,
    ffmpeg_path: Option<String>,
    rate_limit_calls: Option<u32>,
    rate_limit_period: Option<u64>,
    default_quality: Option<u32>,
    default_video_bitrate: Option<String>,
    default_audio_bitrate: Option<String>,
    default_fps: Option<u32>,
    max_sessions: Option<usize>,
    max_sessions_per_owner: Option<usize>,
    max_restarts: Option<u32>,
    load_high_water: Option<f64>,
}

impl EnvOverrides {
    fn apply(self, cfg: &mut Config) -> Result<(), ConfigError> {
        if let Some(raw) = self.admin_ids {
            cfg.privileged = parse_ids(&raw)?;
        }
        if let Some(path) = self.ffmpeg_path.filter(|p| !p.trim().is_empty()) {
            cfg.encoder_path = path;
        }
        if let Some(calls) = self.rate_limit_calls {
            cfg.rate_limit_calls = calls;
        }
        if let Some(secs) = self.rate_limit_period {
            if secs == 0 {
                return Err(invalid("RATE_LIMIT_PERIOD", "must be at least 1 second"));
            }
            cfg.rate_limit_period = Duration::from_secs(secs);
        }
        if let Some(height) = self.default_quality {
            cfg.default_quality = Tier::from_height(height).unwrap_or_else(|| {
                tracing::warn!(height, fallback = %Tier::P720, "unsupported DEFAULT_QUALITY");
                Tier::from_height_or_default(height)
            });
        }
        if let Some(raw) = self.default_video_bitrate.filter(|v| !v.trim().is_empty()) {
            let rate = raw
                .parse::<Bitrate>()
                .map_err(|e| invalid("DEFAULT_VIDEO_BITRATE", e))?;
            cfg.default_video_bitrate = Some(rate);
        }
        if let Some(raw) = self.default_audio_bitrate.filter(|v| !v.trim().is_empty()) {
            cfg.audio_bitrate = raw
                .parse::<Bitrate>()
                .map_err(|e| invalid("DEFAULT_AUDIO_BITRATE", e))?;
        }
        if let Some(fps) = self.default_fps {
            if fps == 0 {
                return Err(invalid("DEFAULT_FPS", "must be positive"));
            }
            cfg.fps = fps;
        }
        if let Some(n) = self.max_sessions {
            cfg.max_sessions = n;
        }
        if let Some(n) = self.max_sessions_per_owner {
            cfg.max_sessions_per_owner = n;
        }
        if let Some(n) = self.max_restarts {
            cfg.restart.max_restarts = n;
        }
        if let Some(mark) = self.load_high_water {
            if !(0.0..=1.0).contains(&mark) {
                return Err(invalid("LOAD_HIGH_WATER", "expected a value in 0.0..=1.0"));
            }
            cfg.load_high_water = mark;
        }
        Ok(())
    }
}

fn parse_ids(raw: &str) -> Result<Vec<CallerId>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u64>()
                .map(CallerId)
                .map_err(|e| invalid("ADMIN_IDS", format!("{s:?}: {e}")))
        })
        .collect()
}

fn invalid(key: &'static str, reason: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        key,
        reason: reason.to_string(),
    }
}
