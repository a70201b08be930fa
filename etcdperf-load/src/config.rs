//! Configuration of a load test.
//!
//! Configuration can be loaded from multiple sources with the following precedence (highest to
//! lowest):
//!
//! 1. Command line flags of `kv-load`
//! 2. Environment variables (prefixed with `KVLOAD__`, using `__` for nesting)
//! 3. YAML configuration file (specified via `-c` or `--config` flag)
//! 4. Defaults
//!
//! ```yaml
//! host: http://localhost:5001
//! users: 50
//! spawn_rate: 5
//! run_time: 2m
//! wait_time:
//!   min: 100ms
//!   max: 500ms
//! tasks:
//!   put: 3
//!   get: 10
//!   delete: 1
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::{Result, bail, ensure};
use etcdperf_types::logging::Logging;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};

/// Environment variable prefix for all configuration options.
const ENV_PREFIX: &str = "KVLOAD__";

/// Range of the think time a virtual user waits between two tasks.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq)]
pub struct WaitTime {
    /// Shortest think time.
    #[serde(with = "humantime_serde")]
    pub min: Duration,
    /// Longest think time.
    #[serde(with = "humantime_serde")]
    pub max: Duration,
}

impl Default for WaitTime {
    fn default() -> Self {
        Self {
            min: Duration::from_millis(100),
            max: Duration::from_millis(500),
        }
    }
}

/// Relative weights of the tasks a virtual user picks from.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct TaskWeights {
    /// Weight of `POST /kv`.
    pub put: u32,
    /// Weight of `GET /kv/{key}`.
    pub get: u32,
    /// Weight of `DELETE /kv/{key}`.
    pub delete: u32,
}

impl Default for TaskWeights {
    fn default() -> Self {
        Self {
            put: 3,
            get: 10,
            delete: 1,
        }
    }
}

/// Load test configuration.
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the HTTP gateway in front of the store.
    pub host: String,

    /// Number of concurrent virtual users once ramp-up has finished.
    pub users: usize,

    /// Number of virtual users started per second during ramp-up.
    pub spawn_rate: f64,

    /// Total duration of the test, including ramp-up.
    #[serde(with = "humantime_serde")]
    pub run_time: Duration,

    /// Think time between two tasks of a virtual user.
    pub wait_time: WaitTime,

    /// Task weights.
    pub tasks: TaskWeights,

    /// Prefix of all generated keys.
    pub key_prefix: String,

    /// Number of random characters appended to the key prefix.
    pub key_length: usize,

    /// Number of random characters in generated values.
    pub value_length: usize,

    /// Seed for all random decisions. Random if not set.
    pub seed: Option<u64>,

    /// Optional per-request timeout.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Option<Duration>,

    /// Logging configuration.
    pub logging: Logging,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "http://localhost:5001".to_owned(),
            users: 10,
            spawn_rate: 1.0,
            run_time: Duration::from_secs(60),
            wait_time: WaitTime::default(),
            tasks: TaskWeights::default(),
            key_prefix: "perf_test_".to_owned(),
            key_length: 10,
            value_length: 100,
            seed: None,
            request_timeout: None,
            logging: Logging::default(),
        }
    }
}

impl Config {
    /// Loads the configuration from defaults, an optional YAML file, and the environment.
    ///
    /// The result is not validated, so that command line overrides can still be applied. Call
    /// [`validate`](Self::validate) afterwards.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        Ok(config)
    }

    /// Checks that the configuration describes a runnable test.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.users > 0, "at least one user is required");
        ensure!(
            self.spawn_rate.is_finite() && self.spawn_rate > 0.0,
            "spawn rate must be positive"
        );
        ensure!(self.run_time > Duration::ZERO, "run time must be positive");
        ensure!(
            self.wait_time.min <= self.wait_time.max,
            "minimum wait time exceeds maximum"
        );
        let total_weight = self.tasks.put.checked_add(self.tasks.get);
        let Some(total_weight) = total_weight.and_then(|w| w.checked_add(self.tasks.delete)) else {
            bail!("task weights must not add up to more than {}", u32::MAX);
        };
        ensure!(total_weight > 0, "at least one task needs a positive weight");
        ensure!(self.key_length > 0, "key length must be positive");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();

        assert_eq!(
            config.tasks,
            TaskWeights {
                put: 3,
                get: 10,
                delete: 1,
            }
        );
        assert_eq!(config.wait_time.min, Duration::from_millis(100));
        assert_eq!(config.wait_time.max, Duration::from_millis(500));
    }

    #[test]
    fn configurable_via_env() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("KVLOAD__HOST", "http://gateway:8080");
            jail.set_env("KVLOAD__USERS", "100");
            jail.set_env("KVLOAD__RUN_TIME", "5m");
            jail.set_env("KVLOAD__TASKS__DELETE", "0");
            jail.set_env("KVLOAD__WAIT_TIME__MIN", "1s");
            jail.set_env("KVLOAD__WAIT_TIME__MAX", "2s");

            let config = Config::load(None).unwrap();

            assert_eq!(config.host, "http://gateway:8080");
            assert_eq!(config.users, 100);
            assert_eq!(config.run_time, Duration::from_secs(300));
            assert_eq!(config.tasks.delete, 0);
            assert_eq!(config.tasks.get, 10);
            assert_eq!(config.wait_time.min, Duration::from_secs(1));

            Ok(())
        });
    }

    #[test]
    fn configurable_via_yaml() {
        let mut tempfile = tempfile::NamedTempFile::new().unwrap();
        tempfile
            .write_all(
                br#"
            users: 3
            spawn_rate: 0.5
            seed: 42
            tasks:
                put: 1
                get: 1
            "#,
            )
            .unwrap();

        figment::Jail::expect_with(|jail| {
            jail.set_env("KVLOAD__USERS", "4");

            let config = Config::load(Some(tempfile.path())).unwrap();

            assert_eq!(config.users, 4);
            assert_eq!(config.spawn_rate, 0.5);
            assert_eq!(config.seed, Some(42));
            assert_eq!(
                config.tasks,
                TaskWeights {
                    put: 1,
                    get: 1,
                    delete: 1,
                }
            );

            Ok(())
        });
    }

    #[test]
    fn rejects_invalid_values() {
        let config = Config {
            users: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            wait_time: WaitTime {
                min: Duration::from_secs(2),
                max: Duration::from_secs(1),
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            tasks: TaskWeights {
                put: 0,
                get: 0,
                delete: 0,
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            tasks: TaskWeights {
                put: u32::MAX,
                get: 1,
                delete: 0,
            },
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("task weights"), "{err}");

        let config = Config {
            tasks: TaskWeights {
                put: u32::MAX,
                get: 0,
                delete: 0,
            },
            ..Default::default()
        };
        config.validate().unwrap();
    }
}
