//! Slack agent
//!
//! Hosts the slack pipeline next to the cluster runtime: reads usage
//! reports, emits estimates and QoS decisions, and serves health and
//! metrics endpoints.

pub mod api;
pub mod config;
pub mod ingest;
pub mod source;
