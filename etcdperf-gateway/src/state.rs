use std::sync::Arc;

use etcdperf_client::{BoxedStore, Credentials, EtcdClient, InMemoryStore};
use secrecy::ExposeSecret;

use crate::cache::ReadCache;
use crate::config::{Config, Store};

/// Shared reference to the gateway [service state](State).
pub type ServiceState = Arc<State>;

/// State shared with all HTTP request handlers.
///
/// In request handlers, use `axum::extract::State<ServiceState>` to retrieve a shared reference to
/// this structure.
#[derive(Debug)]
pub struct State {
    /// The gateway configuration.
    pub config: Config,
    /// The store requests are forwarded to.
    pub store: BoxedStore,
    /// Recently read values.
    pub cache: ReadCache,
}

impl State {
    /// Connects to the configured store.
    pub fn new(config: Config) -> anyhow::Result<ServiceState> {
        let store: BoxedStore = match &config.store {
            Store::Etcd {
                endpoints,
                timeout,
                username,
                password,
            } => {
                let mut client = EtcdClient::with_endpoints(endpoints, *timeout)?;
                if let Some(username) = username.as_deref().filter(|name| !name.is_empty()) {
                    let password = password.as_ref().map(|p| p.expose_secret().as_str());
                    client = client.with_credentials(Credentials {
                        username: username.to_owned(),
                        password: password.unwrap_or_default().to_owned(),
                    });
                }
                Box::new(client)
            }
            Store::Memory => Box::new(InMemoryStore::new()),
        };

        Ok(Self::with_store(config, store))
    }

    /// Creates the state with an existing store, ignoring the store configuration.
    pub fn with_store(config: Config, store: BoxedStore) -> ServiceState {
        let cache = ReadCache::new(&config.cache);
        tracing::info!(store = store.name(), ?cache, "Using store");
        Arc::new(Self {
            config,
            store,
            cache,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_missing_endpoints() {
        let config = Config {
            store: Store::Etcd {
                endpoints: Vec::new(),
                timeout: None,
                username: None,
                password: None,
            },
            ..Default::default()
        };
        assert!(State::new(config).is_err());
    }
}
