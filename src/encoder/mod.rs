//! External encoder processes.
//!
//! ## Contents
//! - [`Launcher`] / [`Encoder`] the seam between sessions and processes
//! - [`FfmpegLauncher`] the production launcher
//! - [`RtmpTarget`], [`StreamKey`] destinations with masked keys
//! - [`ExitOutcome`] typed process outcome; raw diagnostics stay inside this module
//!
//! A session actor holds at most one [`Encoder`] at a time and calls
//! [`Encoder::terminate`] before it launches another or leaves a live state.

mod args;
mod diagnostics;
mod process;
mod target;

pub use diagnostics::ExitOutcome;
pub use process::{Encoder, EncoderEvent, FfmpegEncoder, FfmpegLauncher, LaunchSpec, Launcher};
pub use target::{mask, RtmpTarget, StreamKey};
