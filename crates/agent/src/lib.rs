//! Anomaly Agent - scheduled metric anomaly alerting
//!
//! Library half of the agent binary: configuration loading and the
//! health/metrics HTTP API.

pub mod api;
pub mod config;
