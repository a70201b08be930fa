//! Exposes an in-process gateway for use in integration tests.
//!
//! ```
//! use etcdperf_test::server::TestServer;
//!
//! #[tokio::main]
//! async fn main() {
//!    let server = TestServer::new().await;
//!    let url = server.url("/health");
//!    // use the URL in tests...
//! }
//! ```

use std::net::{SocketAddr, TcpListener};

use etcdperf_client::InMemoryStore;
use etcdperf_gateway::config::{Cache, Config, Store};
use etcdperf_gateway::state::State;
use etcdperf_gateway::web::App;

/// An in-process gateway for use in integration tests.
///
/// The gateway is backed by an [`InMemoryStore`], which tests can inspect and manipulate through
/// [`store`](Self::store). It listens on a random available port on localhost.
#[derive(Debug)]
pub struct TestServer {
    handle: tokio::task::JoinHandle<()>,
    socket: SocketAddr,
    store: InMemoryStore,
}

impl TestServer {
    /// Starts a gateway with an empty store.
    pub async fn new() -> Self {
        Self::with_store(InMemoryStore::new()).await
    }

    /// Starts a gateway backed by the given store.
    pub async fn with_store(store: InMemoryStore) -> Self {
        Self::with_cache(store, Cache::default()).await
    }

    /// Starts a gateway backed by the given store, with a custom read cache.
    pub async fn with_cache(store: InMemoryStore, cache: Cache) -> Self {
        let addr = SocketAddr::from(([127, 0, 0, 1], 0));
        let listener = TcpListener::bind(addr).unwrap();
        listener.set_nonblocking(true).unwrap();
        let socket = listener.local_addr().unwrap();

        let config = Config {
            http_addr: socket,
            store: Store::Memory,
            cache,
            ..Default::default()
        };

        let state = State::with_store(config, Box::new(store.clone()));
        let app = App::new(state);

        let handle = tokio::spawn(async move {
            let listener = tokio::net::TcpListener::from_std(listener).unwrap();
            app.serve(listener).await.unwrap();
        });

        Self {
            handle,
            socket,
            store,
        }
    }

    /// Returns the address the server listens on.
    pub fn addr(&self) -> SocketAddr {
        self.socket
    }

    /// Returns the base URL of the server, without a trailing slash.
    ///
    /// This URL uses `localhost` as hostname.
    pub fn host(&self) -> String {
        format!("http://localhost:{}", self.socket.port())
    }

    /// Returns a full URL pointing to the given path.
    pub fn url(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        format!("{}/{}", self.host(), path)
    }

    /// Returns the store behind the server.
    pub fn store(&self) -> &InMemoryStore {
        &self.store
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
