//! Weighted-task load generator for the key-value HTTP gateway.
//!
//! A load test ramps up a number of virtual users at a fixed spawn rate. Every user runs the
//! [`profile`] in a loop: it picks a weighted random task, issues the request, records the response
//! time and outcome, and then waits for a random think time. When the run time has elapsed or the
//! test is interrupted, all users stop and a [`report`] with per-task statistics is printed.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod config;
pub mod engine;
pub mod http;
pub mod metrics;
pub mod profile;
pub mod report;

pub use crate::config::Config;
pub use crate::engine::{LoadTest, LoadTestResult};
pub use crate::metrics::Metrics;
pub use crate::profile::Task;
