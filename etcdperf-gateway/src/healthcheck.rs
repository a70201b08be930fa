use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use anyhow::{Context, Result};

use crate::config::Config;

/// Time after which the gateway counts as unhealthy.
const HEALTHCHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Requests `/health` from the gateway at the configured address and fails on a bad status.
///
/// A gateway bound to all interfaces is checked through loopback.
pub async fn healthcheck(config: Config) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(HEALTHCHECK_TIMEOUT)
        .build()?;
    let url = format!("http://{}/health", probe_addr(config.http_addr));

    tracing::debug!("sending healthcheck request to {}", url);
    let response = client
        .get(&url)
        .send()
        .await
        .with_context(|| format!("gateway not reachable at {url}"))?;
    if !response.status().is_success() {
        anyhow::bail!("Bad Status: {}", response.status());
    }

    tracing::info!("OK");
    Ok(())
}

fn probe_addr(addr: SocketAddr) -> SocketAddr {
    let ip = match addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
        ip => ip,
    };
    SocketAddr::new(ip, addr.port())
}
