//! # Effective quality at launch time.
//!
//! [`QualityController::resolve`] is called once per (re)start. It never runs while
//! an encoder is live, so a running stream is not restarted for quality churn.
//!
//! ```text
//! request ──► pinned (video override)? ──yes──► request as-is
//!                     │ no
//!                     ▼
//!             load > high_water? ──yes──► tier.lower() (lowest tier stays),
//!                     │ no / unknown             base bitrate scaled down with it
//!                     ▼
//!                 requested tier at its base bitrate
//! ```
//!
//! The base bitrate of a tier comes from the tier table unless the operator
//! configured one for it with [`QualityController::with_base_bitrate`].

use crate::quality::tier::{Bitrate, Quality, QualityRequest, Tier};

/// Result of a resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Resolved {
    /// Parameters to launch with.
    pub quality: Quality,
    /// Requested tier if a downgrade happened.
    pub downgraded_from: Option<Tier>,
}

/// Derives encoding parameters from a request and the current load.
#[derive(Clone, Debug)]
pub struct QualityController {
    high_water: f64,
    audio: Bitrate,
    fps: u32,
    base: Option<(Tier, Bitrate)>,
}

impl QualityController {
    /// Controller downgrading above `high_water`, using `audio` and `fps` for every tier.
    pub fn new(high_water: f64, audio: Bitrate, fps: u32) -> Self {
        Self {
            high_water,
            audio,
            fps: fps.max(1),
            base: None,
        }
    }

    /// Uses `rate` instead of the table bitrate for `tier`. Unlike a caller
    /// override it still follows load adaptation.
    pub fn with_base_bitrate(mut self, tier: Tier, rate: Bitrate) -> Self {
        self.base = Some((tier, rate));
        self
    }

    fn base_bitrate(&self, tier: Tier) -> Bitrate {
        match self.base {
            Some((t, rate)) if t == tier => rate,
            _ => tier.video_bitrate(),
        }
    }

    /// Resolves the effective quality; `load = None` counts as low load.
    pub fn resolve(&self, req: &QualityRequest, load: Option<f64>) -> Resolved {
        let audio = req.audio_override.unwrap_or(self.audio);

        if let Some(video) = req.video_override {
            return Resolved {
                quality: Quality {
                    tier: req.tier,
                    video,
                    audio,
                    fps: self.fps,
                },
                downgraded_from: None,
            };
        }

        let base = self.base_bitrate(req.tier);
        let overloaded = load.is_some_and(|l| l > self.high_water);
        let (tier, video, downgraded_from) = match (overloaded, req.tier.lower()) {
            (true, Some(lower)) => {
                let video = base.scaled(lower.video_bitrate().as_kbps(), req.tier.video_bitrate().as_kbps());
                (lower, video, Some(req.tier))
            }
            _ => (req.tier, base, None),
        };

        Resolved {
            quality: Quality {
                tier,
                video,
                audio,
                fps: self.fps,
            },
            downgraded_from,
        }
    }
}
