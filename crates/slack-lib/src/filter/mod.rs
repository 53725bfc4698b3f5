//! Noise filtering for raw usage samples
//!
//! Smooths per-executor usage series before contention detection so that
//! sampling jitter does not look like interference.

mod moving_average;
mod window;

pub use moving_average::MovingAverageFilter;
pub use window::SampleWindow;
