//! Sentry and tracing setup of the gateway.

use etcdperf_types::logging;
use sentry::integrations::tracing as sentry_tracing;
use tracing::Level;
use tracing_subscriber::prelude::*;

use crate::config::Config;

/// Crates whose logs are shown at the configured level.
const CRATE_NAMES: &[&str] = &[
    "kv_gateway",
    "etcdperf_gateway",
    "etcdperf_client",
    "tower_http",
];

/// Initializes Sentry if a DSN is configured.
///
/// The returned guard flushes pending events when dropped.
pub fn init_sentry(config: &Config) -> Option<sentry::ClientInitGuard> {
    let sentry_config = &config.sentry;
    let dsn = sentry_config.dsn.as_deref()?;

    Some(sentry::init(sentry::ClientOptions {
        dsn: dsn.parse().ok(),
        release: sentry::release_name!(),
        environment: sentry_config.environment.clone(),
        sample_rate: sentry_config.sample_rate,
        traces_sample_rate: sentry_config.traces_sample_rate,
        debug: sentry_config.debug,
        ..Default::default()
    }))
}

/// Installs the global tracing subscriber.
///
/// With Sentry enabled, errors and warnings are sent as events and info logs are kept as
/// breadcrumbs.
pub fn init_tracing(config: &Config) {
    let sentry_layer = config.sentry.is_enabled().then(|| {
        sentry_tracing::layer().event_filter(|metadata| match *metadata.level() {
            Level::ERROR | Level::WARN => sentry_tracing::EventFilter::Event,
            Level::INFO => sentry_tracing::EventFilter::Breadcrumb,
            Level::DEBUG | Level::TRACE => sentry_tracing::EventFilter::Ignore,
        })
    });

    tracing_subscriber::registry()
        .with(logging::fmt_layer(&config.logging))
        .with(sentry_layer)
        .with(logging::env_filter(&config.logging, CRATE_NAMES))
        .init();
}
