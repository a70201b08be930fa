//! HTTP client for the key-value gateway.

use std::time::Duration;

use anyhow::{Context, Result};
use etcdperf_types::KvPair;
use reqwest::{Response, Url};

const USER_AGENT: &str = concat!("etcdperf-load/", env!("CARGO_PKG_VERSION"));

/// A remote key-value gateway reached over HTTP.
///
/// Cloning is cheap and shares the connection pool.
#[derive(Clone, Debug)]
pub struct HttpRemote {
    base: Url,
    client: reqwest::Client,
}

impl HttpRemote {
    /// Creates a remote for the gateway at `host`, e.g. `http://localhost:5001`.
    pub fn new(host: &str, timeout: Option<Duration>) -> Result<Self> {
        let base = Url::parse(host).with_context(|| format!("invalid host URL `{host}`"))?;
        anyhow::ensure!(!base.cannot_be_a_base(), "host URL `{host}` cannot be a base");

        let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("failed to build HTTP client")?;

        Ok(Self { base, client })
    }

    /// Returns the URL of `/kv`, or of `/kv/{key}` with the key percent-encoded.
    pub fn kv_url(&self, key: Option<&str>) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("kv");
            if let Some(key) = key {
                segments.push(key);
            }
        }
        url
    }

    /// `POST /kv` with the pair as JSON body.
    pub async fn put(&self, pair: &KvPair) -> reqwest::Result<Response> {
        self.client.post(self.kv_url(None)).json(pair).send().await
    }

    /// `GET /kv/{key}`.
    pub async fn get(&self, key: &str) -> reqwest::Result<Response> {
        self.client.get(self.kv_url(Some(key))).send().await
    }

    /// `DELETE /kv/{key}`.
    pub async fn delete(&self, key: &str) -> reqwest::Result<Response> {
        self.client.delete(self.kv_url(Some(key))).send().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_kv_urls() {
        let remote = HttpRemote::new("http://localhost:5001", None).unwrap();
        assert_eq!(remote.kv_url(None).as_str(), "http://localhost:5001/kv");
        assert_eq!(
            remote.kv_url(Some("perf_test_abc")).as_str(),
            "http://localhost:5001/kv/perf_test_abc"
        );
    }

    #[test]
    fn keeps_base_path() {
        let remote = HttpRemote::new("http://localhost:5001/api/", None).unwrap();
        assert_eq!(
            remote.kv_url(Some("k")).as_str(),
            "http://localhost:5001/api/kv/k"
        );
    }

    #[test]
    fn encodes_keys() {
        let remote = HttpRemote::new("http://localhost:5001", None).unwrap();
        assert_eq!(
            remote.kv_url(Some("a/b c")).as_str(),
            "http://localhost:5001/kv/a%2Fb%20c"
        );
    }

    #[test]
    fn rejects_invalid_hosts() {
        assert!(HttpRemote::new("not a url", None).is_err());
        assert!(HttpRemote::new("mailto:someone@example.com", None).is_err());
    }
}
