//! Direct-client benchmark driver for etcd.
//!
//! The driver connects to etcd with one client per worker and runs a fixed suite of benchmarks:
//!
//! 1. *Sequential Write*: `put` of every key from a single worker.
//! 2. *Sequential Read*: `get` of every key from a single worker.
//! 3. *Concurrent Write*: the same writes, partitioned across the configured concurrency.
//! 4. *Concurrent Read*: the same reads, partitioned across the configured concurrency.
//!
//! Every operation is timed individually. Failed operations are logged and counted, but never
//! abort a run. After each benchmark, a summary with throughput and mean/p95/p99 latency is
//! printed to stdout.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod config;
pub mod report;
pub mod runner;
pub mod stats;
pub mod suite;

pub use crate::config::Config;
pub use crate::runner::{Benchmark, BenchmarkResult, Operation, run_benchmark};
pub use crate::stats::Summary;
pub use crate::suite::run;
