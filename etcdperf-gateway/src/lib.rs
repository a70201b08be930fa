//! HTTP gateway in front of the key-value store.
//!
//! The gateway exposes the [`KvStore`](etcdperf_client::KvStore) operations as a small JSON API,
//! which is the surface driven by the `kv-load` load generator:
//!
//! - `GET /kv/{key}`: returns `{"key", "value"}`, or `404` if the key does not exist. Answers from
//!   the read cache carry `"cached": true`.
//! - `POST /kv`: stores the `{"key", "value"}` body.
//! - `DELETE /kv/{key}`: deletes the key, succeeding whether or not it existed.
//! - `GET /kv`: returns all pairs as a JSON object.
//! - `GET /health`: liveness probe.
//!
//! Failures are answered with an `{"error"}` body. When the store fails, the gateway answers `503`
//! and adds the cause as `"details"`.

pub mod cache;
pub mod cli;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod healthcheck;
pub mod observability;
pub mod state;
pub mod web;
