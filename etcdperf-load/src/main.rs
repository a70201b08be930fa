//! Runs a load test against the key-value gateway and prints per-task statistics.
//!
//! See [`etcdperf_load::config`] for all configuration options.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use argh::FromArgs;
use etcdperf_load::{Config, LoadTest, report};
use etcdperf_types::logging;
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;

/// Crates whose logs are shown at the configured level.
const CRATE_NAMES: &[&str] = &["kv_load", "etcdperf_load"];

/// Load generator for the key-value HTTP gateway
#[derive(Debug, FromArgs)]
struct Args {
    /// path to the YAML configuration file
    #[argh(option, short = 'c')]
    config: Option<PathBuf>,

    /// base URL of the gateway, e.g. http://localhost:5001
    #[argh(option)]
    host: Option<String>,

    /// number of concurrent users
    #[argh(option, short = 'u')]
    users: Option<usize>,

    /// number of users started per second
    #[argh(option, short = 'r')]
    spawn_rate: Option<f64>,

    /// total duration of the test, e.g. 30s or 5m
    #[argh(option, short = 't', from_str_fn(parse_duration))]
    run_time: Option<Duration>,
}

fn parse_duration(value: &str) -> Result<Duration, String> {
    humantime::parse_duration(value).map_err(|err| err.to_string())
}

impl Args {
    fn apply(self, config: &mut Config) {
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(users) = self.users {
            config.users = users;
        }
        if let Some(spawn_rate) = self.spawn_rate {
            config.spawn_rate = spawn_rate;
        }
        if let Some(run_time) = self.run_time {
            config.run_time = run_time;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Args = argh::from_env();

    let mut config = Config::load(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate()?;

    logging::init(&config.logging, CRATE_NAMES);
    tracing::debug!(?config);

    let load_test = LoadTest::new(&config)?;

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                shutdown.cancel();
            }
        }
    });

    let bar = ProgressBar::new_spinner()
        .with_style(ProgressStyle::with_template("{spinner} {msg} {elapsed}")?)
        .with_message("Running load test:");
    bar.enable_steady_tick(Duration::from_millis(100));

    let result = load_test.run(shutdown, &bar).await;
    bar.finish_and_clear();

    report::print_report(&result)?;
    Ok(())
}
