//! Configuration for the key-value gateway.
//!
//! Configuration can be loaded from multiple sources with the following precedence (highest to
//! lowest):
//!
//! 1. The etcd environment variables listed below
//! 2. Environment variables (prefixed with `KVGW__`)
//! 3. YAML configuration file (specified via `-c` or `--config` flag)
//! 4. Defaults
//!
//! # Environment Variables
//!
//! Environment variables use `KVGW__` as a prefix and double underscores (`__`) to denote nested
//! configuration structures. For example:
//!
//! - `KVGW__HTTP_ADDR=0.0.0.0:5001` sets the HTTP server address
//! - `KVGW__STORE__TYPE=etcd` selects the etcd store
//! - `KVGW__STORE__ENDPOINTS=http://etcd-1:2379,http://etcd-2:2379` sets the etcd members
//! - `KVGW__CACHE__CAPACITY=0` disables the read cache
//!
//! The etcd connection can also be set through dedicated variables:
//!
//! | variable        | field            |
//! |-----------------|------------------|
//! | `ETCD_HOSTS`    | `store.endpoints`|
//! | `ETCD_USERNAME` | `store.username` |
//! | `ETCD_PASSWORD` | `store.password` |
//!
//! # YAML Configuration File
//!
//! The above configuration in YAML format would look like this:
//!
//! ```yaml
//! http_addr: 0.0.0.0:5001
//!
//! store:
//!   type: etcd
//!   endpoints:
//!     - http://etcd-1:2379
//!     - http://etcd-2:2379
//!
//! cache:
//!   capacity: 0
//! ```

use std::borrow::Cow;
use std::fmt;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use etcdperf_types::logging::Logging;
use figment::providers::{Env, Format, Serialized, Yaml};
use secrecy::{CloneableSecret, SecretBox, SerializableSecret, zeroize::Zeroize};
use serde::{Deserialize, Deserializer, Serialize};

/// Environment variable prefix for all configuration options.
const ENV_PREFIX: &str = "KVGW__";

/// Dedicated etcd environment variables and the fields they set.
const ETCD_ENV: &[(&str, &str)] = &[
    ("ETCD_HOSTS", "store.endpoints"),
    ("ETCD_USERNAME", "store.username"),
    ("ETCD_PASSWORD", "store.password"),
];

/// Newtype around `String` that protects against accidental logging of secrets in the
/// configuration. Use with [`secrecy::SecretBox`].
#[derive(Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConfigSecret(String);

impl ConfigSecret {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for ConfigSecret {
    fn from(str: &str) -> Self {
        ConfigSecret(str.to_string())
    }
}

impl fmt::Debug for ConfigSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "[redacted]")
    }
}

impl CloneableSecret for ConfigSecret {}
impl SerializableSecret for ConfigSecret {}
impl Zeroize for ConfigSecret {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

/// The store behind the gateway.
///
/// The `type` field in YAML or `__TYPE` in environment variables determines which variant is used.
#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Store {
    /// An etcd cluster, reached through its v3 JSON gateway (type `"etcd"`).
    ///
    /// ```yaml
    /// store:
    ///   type: etcd
    ///   endpoints:
    ///     - http://localhost:2379
    ///   timeout: 5s
    ///   username: root
    ///   password: secret
    /// ```
    Etcd {
        /// Base URLs of the etcd members.
        ///
        /// Also accepts a single comma-separated string, as in `ETCD_HOSTS`.
        #[serde(deserialize_with = "endpoint_list")]
        endpoints: Vec<String>,

        /// Optional timeout for every request to etcd.
        #[serde(default, with = "humantime_serde")]
        timeout: Option<Duration>,

        /// The etcd user. Requests are unauthenticated when this is empty or missing.
        #[serde(default)]
        username: Option<String>,

        /// Password of the etcd user.
        #[serde(default)]
        password: Option<SecretBox<ConfigSecret>>,
    },

    /// A process-local map that is lost on restart (type `"memory"`).
    Memory,
}

/// [Sentry](https://sentry.io/) error tracking configuration.
///
/// Sentry is disabled by default and only enabled when a DSN is provided.
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Sentry {
    /// Sentry DSN. When `None`, Sentry integration is disabled.
    ///
    /// `KVGW__SENTRY__DSN`
    pub dsn: Option<String>,

    /// Environment name for this deployment.
    ///
    /// `KVGW__SENTRY__ENVIRONMENT`
    pub environment: Option<Cow<'static, str>>,

    /// Share of error events sent to Sentry, between `0.0` and `1.0`.
    ///
    /// `KVGW__SENTRY__SAMPLE_RATE`
    pub sample_rate: f32,

    /// Share of transactions sent to Sentry, between `0.0` and `1.0`.
    ///
    /// `KVGW__SENTRY__TRACES_SAMPLE_RATE`
    pub traces_sample_rate: f32,

    /// Enables debug output of the Sentry SDK on stderr.
    pub debug: bool,
}

fn endpoint_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Endpoints {
        List(Vec<String>),
        Joined(String),
    }

    let endpoints = match Endpoints::deserialize(deserializer)? {
        Endpoints::List(list) => list,
        Endpoints::Joined(joined) => joined.split(',').map(str::to_owned).collect(),
    };
    Ok(endpoints
        .into_iter()
        .map(|endpoint| endpoint.trim().to_owned())
        .filter(|endpoint| !endpoint.is_empty())
        .collect())
}

/// The read cache in front of the store.
///
/// Values read with `GET /kv/{key}` are kept for up to `ttl`. Writes and deletes through the
/// gateway evict the key, but changes made directly in etcd remain invisible until expiry.
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Cache {
    /// Maximum number of cached keys. `0` disables the cache.
    ///
    /// `KVGW__CACHE__CAPACITY`
    pub capacity: u64,

    /// Time after which a cached value expires.
    ///
    /// `KVGW__CACHE__TTL`
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
}

impl Cache {
    /// Returns whether the cache is enabled.
    pub fn is_enabled(&self) -> bool {
        self.capacity > 0 && !self.ttl.is_zero()
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self {
            capacity: 500,
            ttl: Duration::from_secs(60),
        }
    }
}

impl Sentry {
    /// Returns whether Sentry integration is enabled.
    pub fn is_enabled(&self) -> bool {
        self.dsn.is_some()
    }
}

impl Default for Sentry {
    fn default() -> Self {
        Self {
            dsn: None,
            environment: None,
            sample_rate: 1.0,
            traces_sample_rate: 0.01,
            debug: false,
        }
    }
}

/// Main configuration struct for the gateway.
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Socket address the HTTP server binds to.
    ///
    /// Defaults to `0.0.0.0:5001`.
    pub http_addr: SocketAddr,

    /// The store requests are forwarded to.
    ///
    /// Defaults to etcd at `http://localhost:2379`.
    pub store: Store,

    /// The read cache in front of the store.
    pub cache: Cache,

    /// Logging configuration.
    pub logging: Logging,

    /// Sentry configuration.
    pub sentry: Sentry,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_addr: SocketAddr::from(([0, 0, 0, 0], 5001)),
            store: Store::Etcd {
                endpoints: vec!["http://localhost:2379".to_owned()],
                timeout: None,
                username: None,
                password: None,
            },
            cache: Cache::default(),
            logging: Logging::default(),
            sentry: Sentry::default(),
        }
    }
}

impl Config {
    /// Loads configuration from defaults, an optional YAML file, and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = figment::Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .merge(etcd_env())
            .extract()?;

        Ok(config)
    }
}

fn etcd_env() -> Env {
    Env::raw().filter_map(|key| {
        ETCD_ENV
            .iter()
            .find(|(var, _)| key.as_str().eq_ignore_ascii_case(var))
            .map(|(_, field)| (*field).into())
    })
}
