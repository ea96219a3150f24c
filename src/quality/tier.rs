//! Resolution tiers, bitrates and the effective encoding quality.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Bitrate in kilobits per second.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Bitrate(u32);

impl Bitrate {
    /// Bitrate of `kbps` kilobits per second.
    pub const fn kbps(kbps: u32) -> Self {
        Self(kbps)
    }

    /// Value in kilobits per second.
    pub const fn as_kbps(self) -> u32 {
        self.0
    }

    /// Scales the bitrate by `num / den`, rounding down (min 1k).
    pub fn scaled(self, num: u32, den: u32) -> Self {
        let den = den.max(1) as u64;
        let v = (self.0 as u64 * num as u64 / den).clamp(1, u32::MAX as u64);
        Self(v as u32)
    }
}

impl fmt::Display for Bitrate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}k", self.0)
    }
}

impl FromStr for Bitrate {
    type Err = String;

    /// Accepts `2500k`, `2500K`, `2500` (kbps) and `4M`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (digits, mul) = match s.as_bytes().last() {
            Some(b'k' | b'K') => (&s[..s.len() - 1], 1),
            Some(b'm' | b'M') => (&s[..s.len() - 1], 1000),
            _ => (s, 1),
        };
        let n: u32 = digits
            .parse()
            .map_err(|_| format!("invalid bitrate {s:?}"))?;
        let kbps = n
            .checked_mul(mul)
            .filter(|v| *v > 0)
            .ok_or_else(|| format!("bitrate {s:?} out of range"))?;
        Ok(Self(kbps))
    }
}

/// Named resolution level. Each tier implies a default video bitrate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    /// 854x480 at 1500k.
    P480,
    /// 1280x720 at 2500k.
    P720,
    /// 1920x1080 at 4500k.
    P1080,
}

impl Tier {
    /// All tiers, lowest first.
    pub const ALL: [Tier; 3] = [Tier::P480, Tier::P720, Tier::P1080];

    /// Maps a vertical resolution (`480`, `720`, `1080`) to its tier.
    pub fn from_height(height: u32) -> Option<Self> {
        match height {
            480 => Some(Tier::P480),
            720 => Some(Tier::P720),
            1080 => Some(Tier::P1080),
            _ => None,
        }
    }

    /// Like [`Tier::from_height`], falling back to 720p for unknown heights.
    pub fn from_height_or_default(height: u32) -> Self {
        Self::from_height(height).unwrap_or(Tier::P720)
    }

    /// Output frame size.
    pub const fn dimensions(self) -> (u32, u32) {
        match self {
            Tier::P480 => (854, 480),
            Tier::P720 => (1280, 720),
            Tier::P1080 => (1920, 1080),
        }
    }

    /// Vertical resolution.
    pub const fn height(self) -> u32 {
        self.dimensions().1
    }

    /// Video bitrate paired with the tier.
    pub const fn video_bitrate(self) -> Bitrate {
        match self {
            Tier::P480 => Bitrate::kbps(1500),
            Tier::P720 => Bitrate::kbps(2500),
            Tier::P1080 => Bitrate::kbps(4500),
        }
    }

    /// Next tier down, `None` for the lowest.
    pub const fn lower(self) -> Option<Self> {
        match self {
            Tier::P480 => None,
            Tier::P720 => Some(Tier::P480),
            Tier::P1080 => Some(Tier::P720),
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}p", self.height())
    }
}

/// What a caller asks for at session creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityRequest {
    /// Requested tier.
    pub tier: Tier,
    /// Explicit video bitrate; disables load adaptation.
    pub video_override: Option<Bitrate>,
    /// Explicit audio bitrate.
    pub audio_override: Option<Bitrate>,
}

impl QualityRequest {
    /// Request for `tier` with table bitrates.
    pub const fn tier(tier: Tier) -> Self {
        Self {
            tier,
            video_override: None,
            audio_override: None,
        }
    }

    /// Sets an explicit video bitrate.
    pub fn with_video(mut self, rate: Bitrate) -> Self {
        self.video_override = Some(rate);
        self
    }

    /// Sets an explicit audio bitrate.
    pub fn with_audio(mut self, rate: Bitrate) -> Self {
        self.audio_override = Some(rate);
        self
    }
}

/// Encoding parameters actually handed to the encoder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quality {
    /// Effective tier.
    pub tier: Tier,
    /// Video bitrate.
    pub video: Bitrate,
    /// Audio bitrate.
    pub audio: Bitrate,
    /// Output frame rate.
    pub fps: u32,
}

impl Quality {
    /// `WIDTHxHEIGHT` for the scale filter.
    pub fn resolution(&self) -> String {
        let (w, h) = self.tier.dimensions();
        format!("{w}x{h}")
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}@{}fps audio {}",
            self.tier, self.video, self.fps, self.audio
        )
    }
}
