//! Clients for the key-value store under test.
//!
//! All clients implement the [`KvStore`] trait, which exposes the handful of operations the
//! benchmark tools and the HTTP gateway need: put, get, delete, and listing all keys.
//!
//! - [`EtcdClient`] talks to one or more etcd endpoints through the v3 JSON gateway.
//! - [`InMemoryStore`] keeps everything in a map and is used in tests.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

use std::fmt::Debug;

use bytes::Bytes;

mod error;
pub mod etcd;
pub mod in_memory;

pub use error::{StoreError, StoreResult};
pub use etcd::{Credentials, EtcdClient};
pub use in_memory::InMemoryStore;

/// User agent string used for outgoing requests.
pub const USER_AGENT: &str = concat!("etcdperf/", env!("CARGO_PKG_VERSION"));

/// A type-erased [`KvStore`] instance.
pub type BoxedStore = Box<dyn KvStore>;

/// Operations on a key-value store.
#[async_trait::async_trait]
pub trait KvStore: Debug + Send + Sync + 'static {
    /// The store name, used for diagnostics.
    fn name(&self) -> &'static str;

    /// Stores `value` under `key`, replacing any previous value.
    async fn put(&self, key: &str, value: Bytes) -> StoreResult<()>;

    /// Returns the value stored under `key`, or `None` if the key does not exist.
    async fn get(&self, key: &str) -> StoreResult<Option<Bytes>>;

    /// Deletes `key` and returns the number of deleted entries.
    ///
    /// Deleting a key that does not exist is not an error.
    async fn delete(&self, key: &str) -> StoreResult<u64>;

    /// Returns all key-value pairs, ordered by key.
    async fn list(&self) -> StoreResult<Vec<(String, Bytes)>>;
}
