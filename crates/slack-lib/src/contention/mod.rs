//! Contention detection for executor usage patterns
//!
//! This module provides:
//! - A short rolling baseline per (resource kind, executor) key
//! - Mild/severe flagging of smoothed values that deviate from it

mod baseline;
mod detector;

pub use baseline::Baseline;
pub use detector::ContentionDetector;
