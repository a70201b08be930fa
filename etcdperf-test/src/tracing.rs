//! Log output for tests.

use tracing_subscriber::EnvFilter;

/// Crates whose logs are shown at all levels. Everything else only logs errors.
const CRATE_NAMES: &[&str] = &[
    "etcdperf_bench",
    "etcdperf_client",
    "etcdperf_gateway",
    "etcdperf_load",
];

/// Initializes logging for the current test binary.
///
/// Logs go to the output captured by the test runner, so they only show up for failing tests or
/// with `--nocapture`. A `RUST_LOG` filter replaces the default of tracing the workspace crates.
/// Calling this more than once is a no-op.
///
/// # Example
///
/// ```
/// etcdperf_test::tracing::init();
/// ```
pub fn init() {
    tracing_subscriber::fmt::fmt()
        .with_env_filter(env_filter())
        .with_target(true)
        .with_test_writer()
        .compact()
        .try_init()
        .ok();
}

fn env_filter() -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    CRATE_NAMES
        .iter()
        .filter_map(|name| format!("{name}=TRACE").parse().ok())
        .fold(EnvFilter::new("ERROR"), EnvFilter::add_directive)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traces_workspace_crates() {
        // SAFETY: no other test in this crate reads or writes the environment
        unsafe { std::env::remove_var("RUST_LOG") };

        let filter = env_filter().to_string();
        for name in CRATE_NAMES {
            assert!(filter.contains(&format!("{name}=trace")), "{filter}");
        }
    }
}
