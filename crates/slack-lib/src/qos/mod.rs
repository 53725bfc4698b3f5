//! QoS corrective decisions
//!
//! Turns severe contention into revoke/throttle actions for the host runtime.

mod controller;

pub use controller::QosController;
