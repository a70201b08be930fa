//! Configuration for the benchmark driver.
//!
//! Configuration is loaded from the following sources, highest precedence first:
//!
//! 1. The benchmark environment variables listed below
//! 2. Environment variables prefixed with `ETCDPERF__`, using `__` for nesting
//! 3. YAML configuration file (specified via `-c` or `--config` flag)
//! 4. Defaults
//!
//! | variable           | field         | default     |
//! |--------------------|---------------|-------------|
//! | `ETCD_HOST`        | `host`        | `127.0.0.1` |
//! | `ETCD_PORT`        | `port`        | `2379`      |
//! | `PERF_OPS`         | `operations`  | `100`       |
//! | `PERF_CONCURRENCY` | `concurrency` | `10`        |
//! | `PERF_DATA_SIZE`   | `data_size`   | `1024`      |
//!
//! The remaining settings, such as `ETCDPERF__LOGGING__LEVEL=debug`, are only available through
//! the prefixed variables or the YAML file:
//!
//! ```yaml
//! host: 10.0.0.5
//! operations: 10000
//! key_prefix: /bench/
//! timeout: 5s
//! logging:
//!   level: debug
//!   format: json
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::{Result, ensure};
use etcdperf_client::etcd::DEFAULT_PORT;
use etcdperf_types::logging::Logging;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};

/// Environment variable prefix for settings without a dedicated variable.
const ENV_PREFIX: &str = "ETCDPERF__";

/// Dedicated environment variables and the fields they set.
const BENCHMARK_ENV: &[(&str, &str)] = &[
    ("ETCD_HOST", "host"),
    ("ETCD_PORT", "port"),
    ("PERF_OPS", "operations"),
    ("PERF_CONCURRENCY", "concurrency"),
    ("PERF_DATA_SIZE", "data_size"),
];

/// Benchmark driver configuration.
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Host name or IP address of the etcd server.
    pub host: String,

    /// Client port of the etcd server.
    pub port: u16,

    /// Number of operations per benchmark.
    pub operations: usize,

    /// Number of workers in the concurrent benchmarks.
    ///
    /// Operations are split evenly across workers; the remainder of `operations / concurrency`
    /// is not executed.
    pub concurrency: usize,

    /// Size in bytes of the values written.
    pub data_size: usize,

    /// Prefix of all benchmark keys. Keys are formed as `{key_prefix}{index}`.
    pub key_prefix: String,

    /// Optional per-request timeout.
    ///
    /// Without a timeout, a request waits as long as the underlying connection allows.
    #[serde(with = "humantime_serde")]
    pub timeout: Option<Duration>,

    /// Logging configuration.
    pub logging: Logging,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: DEFAULT_PORT,
            operations: 100,
            concurrency: 10,
            data_size: 1024,
            key_prefix: "/perf/key-".to_owned(),
            timeout: None,
            logging: Logging::default(),
        }
    }
}

impl Config {
    /// Loads the configuration from defaults, an optional YAML file, and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let config: Config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .merge(benchmark_env())
            .extract()?;

        config.validate()?;
        Ok(config)
    }

    /// Checks that all numeric parameters are positive.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.port > 0, "port must be positive");
        ensure!(self.operations > 0, "operation count must be positive");
        ensure!(self.concurrency > 0, "concurrency must be positive");
        ensure!(self.data_size > 0, "data size must be positive");

        if self.operations < self.concurrency {
            tracing::warn!(
                operations = self.operations,
                concurrency = self.concurrency,
                "fewer operations than workers, concurrent benchmarks will be empty"
            );
        }

        Ok(())
    }

    /// Returns the address of the etcd server, for display.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn benchmark_env() -> Env {
    Env::raw().filter_map(|key| {
        BENCHMARK_ENV
            .iter()
            .find(|(var, _)| key.as_str().eq_ignore_ascii_case(var))
            .map(|(_, field)| (*field).into())
    })
}
