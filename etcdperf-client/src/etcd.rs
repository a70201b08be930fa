//! A [`KvStore`] backed by etcd's v3 JSON gateway.
//!
//! etcd exposes its gRPC key-value API over HTTP on the same port as the gRPC service. Requests
//! are `POST`s with JSON bodies, and all keys and values are base64-encoded. 64-bit integers are
//! serialized as strings.
//!
//! | operation | endpoint            |
//! |-----------|---------------------|
//! | put       | `/v3/kv/put`        |
//! | get, list | `/v3/kv/range`      |
//! | delete    | `/v3/kv/deleterange`|
//! | login     | `/v3/auth/authenticate` |
//!
//! With [`Credentials`], the client logs in once and sends the returned token in the
//! `Authorization` header of every request.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::{KvStore, USER_AGENT};

/// The default etcd client port.
pub const DEFAULT_PORT: u16 = 2379;

/// Range end that, together with a `\0` key, selects every key in the store.
const ALL_KEYS: &[u8] = b"\0";

/// Credentials of an etcd user, exchanged for an auth token on first use.
#[derive(Clone)]
pub struct Credentials {
    /// The etcd user name.
    pub username: String,
    /// The user's password.
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// A client for one or more endpoints of the same etcd cluster.
///
/// Requests rotate over the endpoints. When an endpoint cannot be reached, the request fails over
/// to the next one; error responses of a reachable endpoint are returned as they are.
///
/// Every instance owns its own connection pool. Cloning the client shares the pool; create a new
/// client with [`EtcdClient::new`] to get an independent connection.
#[derive(Clone, Debug)]
pub struct EtcdClient {
    endpoints: Arc<[String]>,
    client: reqwest::Client,
    next: Arc<AtomicUsize>,
    credentials: Option<Credentials>,
    token: Arc<Mutex<Option<String>>>,
}

impl EtcdClient {
    /// Creates a client for the given endpoint, e.g. `http://127.0.0.1:2379`.
    ///
    /// The optional `timeout` applies to each request as a whole.
    pub fn new(endpoint: impl Into<String>, timeout: Option<Duration>) -> StoreResult<Self> {
        let endpoint: String = endpoint.into();
        Self::with_endpoints([endpoint], timeout)
    }

    /// Creates a client for several endpoints of one cluster.
    ///
    /// Fails if `endpoints` is empty.
    pub fn with_endpoints<I>(endpoints: I, timeout: Option<Duration>) -> StoreResult<Self>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let endpoints: Arc<[String]> = endpoints
            .into_iter()
            .map(Into::<String>::into)
            .map(|endpoint| endpoint.trim().trim_end_matches('/').to_owned())
            .filter(|endpoint| !endpoint.is_empty())
            .collect();
        if endpoints.is_empty() {
            return Err(StoreError::Unavailable("no etcd endpoints configured".into()));
        }

        let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|cause| StoreError::reqwest("building HTTP client", cause))?;

        Ok(Self {
            endpoints,
            client,
            next: Arc::default(),
            credentials: None,
            token: Arc::default(),
        })
    }

    /// Creates a client for `http://{host}:{port}`.
    pub fn for_host(host: &str, port: u16, timeout: Option<Duration>) -> StoreResult<Self> {
        Self::new(format!("http://{host}:{port}"), timeout)
    }

    /// Authenticates all requests as the given etcd user.
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Returns the endpoints this client talks to.
    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    async fn call<Req, Res>(&self, method: &str, body: &Req) -> StoreResult<Res>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        let path = format!("v3/kv/{method}");
        match self.send(&path, body, self.auth_token().await?).await {
            // an expired token is refreshed once
            Err(StoreError::Server { status: 401, .. }) if self.credentials.is_some() => {
                self.clear_token();
                let token = self.auth_token().await?;
                self.send(&path, body, token).await
            }
            result => result,
        }
    }

    /// Sends a request to the next endpoint, failing over to the others if it is unreachable.
    async fn send<Req, Res>(
        &self,
        path: &str,
        body: &Req,
        token: Option<String>,
    ) -> StoreResult<Res>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        let first = self.next.fetch_add(1, Ordering::Relaxed);
        let mut last_error = None;

        for offset in 0..self.endpoints.len() {
            let endpoint = &self.endpoints[(first + offset) % self.endpoints.len()];
            let mut request = self.client.post(format!("{endpoint}/{path}")).json(body);
            if let Some(token) = &token {
                request = request.header(reqwest::header::AUTHORIZATION, token);
            }

            match request.send().await {
                Ok(response) => return parse_response(path, response).await,
                Err(cause) => {
                    tracing::debug!(
                        endpoint,
                        error = &cause as &dyn std::error::Error,
                        "etcd endpoint unreachable"
                    );
                    let context = format!("sending {path} request");
                    last_error = Some(StoreError::reqwest(context, cause));
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| StoreError::Unavailable("no etcd endpoints configured".into())))
    }

    /// Returns the auth token, authenticating first if credentials are set and no token is cached.
    async fn auth_token(&self) -> StoreResult<Option<String>> {
        let Some(credentials) = &self.credentials else {
            return Ok(None);
        };
        let cached = self.lock_token().clone();
        if cached.is_some() {
            return Ok(cached);
        }

        let request = AuthenticateRequest {
            name: &credentials.username,
            password: &credentials.password,
        };
        let response: AuthenticateResponse =
            self.send("v3/auth/authenticate", &request, None).await?;
        tracing::debug!(user = %credentials.username, "authenticated with etcd");

        *self.lock_token() = Some(response.token.clone());
        Ok(Some(response.token))
    }

    fn clear_token(&self) {
        self.lock_token().take();
    }

    fn lock_token(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.token.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn parse_response<Res>(path: &str, response: reqwest::Response) -> StoreResult<Res>
where
    Res: DeserializeOwned,
{
    let status = response.status();
    if !status.is_success() {
        let message = match response.json::<GatewayError>().await {
            Ok(error) => error.into_message(),
            Err(_) => status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_owned(),
        };
        return Err(StoreError::Server {
            status: status.as_u16(),
            message,
        });
    }

    response
        .json()
        .await
        .map_err(|cause| StoreError::reqwest(format!("reading {path} response"), cause))
}

#[async_trait::async_trait]
impl KvStore for EtcdClient {
    fn name(&self) -> &'static str {
        "etcd"
    }

    #[tracing::instrument(level = "trace", skip(self, value))]
    async fn put(&self, key: &str, value: Bytes) -> StoreResult<()> {
        let request = PutRequest {
            key: encode(key.as_bytes()),
            value: encode(&value),
        };
        let _: serde_json::Value = self.call("put", &request).await?;
        Ok(())
    }

    #[tracing::instrument(level = "trace", skip(self))]
    async fn get(&self, key: &str) -> StoreResult<Option<Bytes>> {
        let request = RangeRequest {
            key: encode(key.as_bytes()),
            range_end: None,
        };
        let response: RangeResponse = self.call("range", &request).await?;

        match response.kvs.into_iter().next() {
            Some(kv) => Ok(Some(decode(&kv.value, "value")?)),
            None => Ok(None),
        }
    }

    #[tracing::instrument(level = "trace", skip(self))]
    async fn delete(&self, key: &str) -> StoreResult<u64> {
        let request = RangeRequest {
            key: encode(key.as_bytes()),
            range_end: None,
        };
        let response: DeleteRangeResponse = self.call("deleterange", &request).await?;
        response.deleted.map_or(Ok(0), |deleted| deleted.get())
    }

    async fn list(&self) -> StoreResult<Vec<(String, Bytes)>> {
        let request = RangeRequest {
            key: encode(ALL_KEYS),
            range_end: Some(encode(ALL_KEYS)),
        };
        let response: RangeResponse = self.call("range", &request).await?;

        response
            .kvs
            .into_iter()
            .map(|kv| {
                let key = decode(&kv.key, "key")?;
                let value = decode(&kv.value, "value")?;
                Ok((String::from_utf8_lossy(&key).into_owned(), value))
            })
            .collect()
    }
}

fn encode(data: &[u8]) -> String {
    BASE64_STANDARD.encode(data)
}

fn decode(data: &str, context: &str) -> StoreResult<Bytes> {
    BASE64_STANDARD
        .decode(data)
        .map(Bytes::from)
        .map_err(|cause| StoreError::decode(format!("base64 {context}"), cause))
}

#[derive(Serialize)]
struct AuthenticateRequest<'a> {
    name: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct AuthenticateResponse {
    token: String,
}

#[derive(Debug, Serialize)]
struct PutRequest {
    key: String,
    value: String,
}

#[derive(Debug, Serialize)]
struct RangeRequest {
    key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    range_end: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RangeResponse {
    #[serde(default)]
    kvs: Vec<KeyValue>,
}

#[derive(Debug, Deserialize)]
struct KeyValue {
    key: String,
    #[serde(default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct DeleteRangeResponse {
    #[serde(default)]
    deleted: Option<Int64>,
}

/// A protobuf `int64`, which the gateway renders as a JSON string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Int64 {
    String(String),
    Number(u64),
}

impl Int64 {
    fn get(self) -> StoreResult<u64> {
        match self {
            Int64::Number(n) => Ok(n),
            Int64::String(s) => s
                .parse()
                .map_err(|cause| StoreError::decode("deleted count", cause)),
        }
    }
}

/// Error body returned by the gateway for failed calls.
#[derive(Debug, Deserialize)]
struct GatewayError {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl GatewayError {
    fn into_message(self) -> String {
        self.message
            .or(self.error)
            .unwrap_or_else(|| "unknown error".to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_trailing_slash() {
        let client = EtcdClient::new("http://localhost:2379/", None).unwrap();
        assert_eq!(client.endpoints(), ["http://localhost:2379"]);

        let client = EtcdClient::for_host("10.0.0.1", DEFAULT_PORT, None).unwrap();
        assert_eq!(client.endpoints(), ["http://10.0.0.1:2379"]);
    }

    #[test]
    fn skips_blank_endpoints() {
        let client =
            EtcdClient::with_endpoints(["http://a:2379", " http://b:2379/ ", ""], None).unwrap();
        assert_eq!(client.endpoints(), ["http://a:2379", "http://b:2379"]);

        let err = EtcdClient::with_endpoints(Vec::<String>::new(), None).unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[test]
    fn credentials_hide_password() {
        let credentials = Credentials {
            username: "root".into(),
            password: "secret".into(),
        };
        let debug = format!("{credentials:?}");
        assert!(debug.contains("root"));
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn range_request_omits_missing_end() {
        let request = RangeRequest {
            key: encode(b"/perf/key-1"),
            range_end: None,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(json, r#"{"key":"L3BlcmYva2V5LTE="}"#);
    }

    #[test]
    fn parses_empty_range() {
        let response: RangeResponse =
            serde_json::from_str(r#"{"header":{"revision":"7"}}"#).unwrap();
        assert!(response.kvs.is_empty());
    }

    #[test]
    fn parses_range_with_empty_value() {
        // the gateway omits default values, including empty byte strings
        let response: RangeResponse =
            serde_json::from_str(r#"{"kvs":[{"key":"Zm9v","create_revision":"2"}],"count":"1"}"#)
                .unwrap();
        assert_eq!(response.kvs.len(), 1);
        assert_eq!(decode(&response.kvs[0].key, "key").unwrap(), "foo");
        assert_eq!(decode(&response.kvs[0].value, "value").unwrap(), "");
    }

    #[test]
    fn parses_deleted_count() {
        let response: DeleteRangeResponse = serde_json::from_str(r#"{"deleted":"3"}"#).unwrap();
        assert_eq!(response.deleted.unwrap().get().unwrap(), 3);

        let response: DeleteRangeResponse = serde_json::from_str(r#"{"header":{}}"#).unwrap();
        assert!(response.deleted.is_none());
    }

    #[test]
    fn gateway_error_prefers_message() {
        let body = r#"{
            "error": "etcdserver: too many requests",
            "code": 8,
            "message": "etcdserver: too many requests"
        }"#;
        let error: GatewayError = serde_json::from_str(body).unwrap();
        assert_eq!(error.into_message(), "etcdserver: too many requests");
    }
}
