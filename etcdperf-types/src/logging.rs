//! Logging setup shared by all etcdperf binaries.
//!
//! Log output goes to stderr, so that it never interleaves with the reports printed to stdout.
//! The verbosity can be configured via [`Logging::level`], or overridden with `RUST_LOG`. If
//! `RUST_LOG` holds a plain level (such as `debug`), it replaces the configured level for the
//! workspace crates. Any other value is used literally as an [`EnvFilter`].

use std::env;
use std::fmt;
use std::io::IsTerminal;

use serde::{Deserialize, Serialize};
use tracing::Subscriber;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, prelude::*};

/// Log output format.
///
/// Controls how log messages are formatted. The format can be explicitly specified or
/// auto-detected based on whether output is to a TTY.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Auto detect the best format.
    ///
    /// This chooses [`LogFormat::Pretty`] for TTY, otherwise [`LogFormat::Simplified`].
    #[default]
    Auto,

    /// Pretty printing with colors.
    ///
    /// ```text
    ///  INFO etcdperf_bench::runner: Starting benchmark
    /// ```
    Pretty,

    /// Simplified plain text output.
    ///
    /// ```text
    /// 2020-12-04T12:10:32Z  INFO etcdperf_bench::runner: Starting benchmark
    /// ```
    Simplified,

    /// Dump out JSON lines.
    Json,
}

/// The logging format parse error.
#[derive(Clone, Debug)]
pub struct FormatParseError(String);

impl fmt::Display for FormatParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            r#"error parsing "{}" as format: expected one of "auto", "pretty", "simplified", "json""#,
            self.0
        )
    }
}

impl std::error::Error for FormatParseError {}

impl std::str::FromStr for LogFormat {
    type Err = FormatParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let result = match s {
            "" => LogFormat::Auto,
            s if s.eq_ignore_ascii_case("auto") => LogFormat::Auto,
            s if s.eq_ignore_ascii_case("pretty") => LogFormat::Pretty,
            s if s.eq_ignore_ascii_case("simplified") => LogFormat::Simplified,
            s if s.eq_ignore_ascii_case("json") => LogFormat::Json,
            s => return Err(FormatParseError(s.into())),
        };

        Ok(result)
    }
}

mod display_fromstr {
    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
        T: std::fmt::Display,
    {
        serializer.collect_str(&value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        D: serde::Deserializer<'de>,
        T: std::str::FromStr,
        <T as std::str::FromStr>::Err: std::fmt::Display,
    {
        use serde::Deserialize;
        let s = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Logging configuration, embedded into the configuration of every binary.
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Logging {
    /// Minimum log level for the workspace crates.
    ///
    /// Defaults to `info`. Dependencies always log at `warn` and above unless `RUST_LOG`
    /// contains a full filter expression.
    #[serde(with = "display_fromstr")]
    pub level: LevelFilter,

    /// Output format, see [`LogFormat`].
    pub format: LogFormat,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: LevelFilter::INFO,
            format: LogFormat::Auto,
        }
    }
}

/// Creates the filter for the given crates, honoring `RUST_LOG`.
pub fn env_filter(logging: &Logging, crates: &[&str]) -> EnvFilter {
    let level = match env::var(EnvFilter::DEFAULT_ENV) {
        Ok(value) => match value.parse::<LevelFilter>() {
            Ok(level) => level,
            Err(_) => return EnvFilter::new(value),
        },
        Err(_) => logging.level,
    };

    let directives: Vec<String> = std::iter::once("warn".to_owned())
        .chain(crates.iter().map(|name| format!("{name}={level}")))
        .collect();

    EnvFilter::new(directives.join(","))
}

/// Creates the formatting layer for the configured [`LogFormat`].
pub fn fmt_layer<S>(logging: &Logging) -> Box<dyn Layer<S> + Send + Sync + 'static>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let format = match logging.format {
        LogFormat::Auto if std::io::stderr().is_terminal() => LogFormat::Pretty,
        LogFormat::Auto => LogFormat::Simplified,
        format => format,
    };

    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);

    match format {
        LogFormat::Pretty => layer.compact().with_ansi(true).boxed(),
        LogFormat::Json => layer.json().flatten_event(true).boxed(),
        LogFormat::Auto | LogFormat::Simplified => layer.with_ansi(false).boxed(),
    }
}

/// Installs the global tracing subscriber for a binary.
///
/// `crates` lists the crate names (in module path form) that log at the configured level.
pub fn init(logging: &Logging, crates: &[&str]) {
    tracing_subscriber::registry()
        .with(fmt_layer(logging))
        .with(env_filter(logging, crates))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_formats() {
        assert_eq!("".parse::<LogFormat>().unwrap(), LogFormat::Auto);
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("colorful".parse::<LogFormat>().is_err());
    }

    #[test]
    fn logging_defaults() {
        let logging = Logging::default();
        assert_eq!(logging.level, LevelFilter::INFO);
        assert_eq!(logging.format, LogFormat::Auto);
    }
}
