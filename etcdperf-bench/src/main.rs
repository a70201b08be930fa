//! Benchmarks put and get latencies of an etcd server.
//!
//! See the [`etcdperf_bench`] crate documentation for the benchmarks that are run, and
//! [`etcdperf_bench::config`] for all configuration options.

use std::path::PathBuf;

use anyhow::Result;
use argh::FromArgs;
use etcdperf_bench::Config;
use etcdperf_types::logging;

/// Crates whose logs are shown at the configured level.
const CRATE_NAMES: &[&str] = &["etcd_bench", "etcdperf_bench", "etcdperf_client"];

/// Benchmark driver for etcd put/get latencies
#[derive(Debug, FromArgs)]
struct Args {
    /// path to the YAML configuration file
    #[argh(option, short = 'c')]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args: Args = argh::from_env();

    let config = Config::load(args.config.as_deref())?;
    logging::init(&config.logging, CRATE_NAMES);
    tracing::debug!(?config);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("bench-rt")
        .enable_all()
        .build()?;

    runtime.block_on(etcdperf_bench::run(&config))
}
