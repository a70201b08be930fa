//! Test utilities for the etcdperf tools.
//!
//! This crate provides utilities to facilitate integration testing of the gateway and the load
//! generator. See the modules for all available utilities.

pub mod server;
pub mod tracing;

pub use server::TestServer;
