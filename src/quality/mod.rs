//! Adaptive encoding quality.
//!
//! ## Contents
//! - [`Tier`], [`Bitrate`], [`Quality`], [`QualityRequest`] the tier table and its values
//! - [`QualityController`] request + load → effective [`Quality`]
//! - [`LoadSource`] normalized load samplers ([`NoLoad`], [`FixedLoad`], [`LoadAverage`])

mod controller;
mod load;
mod tier;

pub use controller::{QualityController, Resolved};
pub use load::{FixedLoad, LoadAverage, LoadSource, NoLoad};
pub use tier::{Bitrate, Quality, QualityRequest, Tier};
