//! Slack estimation from consecutive usage reports
//!
//! This module provides:
//! - Per-executor snapshot history across reports
//! - Reserved-but-unused capacity estimation, capped and epsilon-filtered

mod history;
mod slack;

pub use history::ExecutorHistory;
pub use slack::{EstimationOutcome, SlackEstimator};
