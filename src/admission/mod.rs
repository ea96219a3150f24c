//! Rate admission for caller-facing operations.

mod gate;

pub use gate::RateGate;
